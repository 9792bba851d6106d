//! In-memory [`VectorStore`] implementation for tests and embedding.
//!
//! Entries live in a `HashMap` keyed by chunk ID behind a
//! `std::sync::RwLock`, so re-inserting a chunk replaces it. Search is
//! brute-force cosine similarity over every stored vector.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::chunk::Chunk;
use crate::embedding::cosine_similarity;

use super::{check_batch, rank, SearchFilters, SearchResult, VectorStore, DEFAULT_BATCH_SIZE};

struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// In-memory vector store.
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, StoredChunk>>,
    batch_size: usize,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            batch_size: batch_size.max(1),
        }
    }

    /// Number of stored chunks across all projects.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// IDs of every chunk stored for `project`, sorted.
    pub fn ids_for_project(&self, project: &str) -> Vec<String> {
        let entries = match self.entries.read() {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        let mut ids: Vec<String> = entries
            .values()
            .filter(|s| s.chunk.project == project)
            .map(|s| s.chunk.id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("in-memory vector store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_batch(chunks, vectors)?;

        for (batch_chunks, batch_vectors) in chunks
            .chunks(self.batch_size)
            .zip(vectors.chunks(self.batch_size))
        {
            let mut entries = self.entries.write().map_err(|_| poisoned())?;
            for (chunk, vector) in batch_chunks.iter().zip(batch_vectors) {
                entries.insert(
                    chunk.id.clone(),
                    StoredChunk {
                        chunk: chunk.clone(),
                        vector: vector.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn delete(&self, project: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.retain(|_, stored| stored.chunk.project != project);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let results = entries
            .values()
            .filter(|stored| filters.matches(&stored.chunk))
            .map(|stored| {
                SearchResult::from_similarity(
                    stored.chunk.clone(),
                    cosine_similarity(query, &stored.vector),
                )
            })
            .collect();
        Ok(rank(results, limit))
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let projects: BTreeSet<String> = entries
            .values()
            .map(|stored| stored.chunk.project.clone())
            .collect();
        Ok(projects.into_iter().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Chunk>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(id).map(|stored| stored.chunk.clone()))
    }
}
