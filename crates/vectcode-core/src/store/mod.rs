//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait is the narrow contract the indexing pipeline
//! writes through and search reads through. Backends are pluggable: the
//! in-memory store in [`memory`] ships with this crate, and a SQLite-backed
//! store lives in the `vectcode` app crate.
//!
//! Writes are expected to behave as upserts keyed by [`Chunk::id`]. The
//! pipeline relies on that for idempotent re-indexing but does not enforce
//! it.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::chunk::{Chunk, ChunkKind};

/// Default number of chunks written per internal batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// A chunk returned from similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`, higher is closer.
    pub score: f64,
    /// Cosine distance, `1.0 - score`.
    pub distance: f64,
}

impl SearchResult {
    pub fn from_similarity(chunk: Chunk, similarity: f32) -> Self {
        let score = similarity as f64;
        Self {
            chunk,
            score,
            distance: 1.0 - score,
        }
    }
}

/// Metadata filters applied to search. All set filters must match.
///
/// `project` is an exact match; `projects` matches any of the listed names
/// and is what group-scoped search uses.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub project: Option<String>,
    pub projects: Vec<String>,
    pub language: Option<String>,
    pub kind: Option<ChunkKind>,
    pub package: Option<String>,
    pub file_path: Option<String>,
}

impl SearchFilters {
    pub fn project(name: impl Into<String>) -> Self {
        Self {
            project: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn projects(names: Vec<String>) -> Self {
        Self {
            projects: names,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.project.is_none()
            && self.projects.is_empty()
            && self.language.is_none()
            && self.kind.is_none()
            && self.package.is_none()
            && self.file_path.is_none()
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(ref project) = self.project {
            if &chunk.project != project {
                return false;
            }
        }
        if !self.projects.is_empty() && !self.projects.iter().any(|p| p == &chunk.project) {
            return false;
        }
        if let Some(ref language) = self.language {
            if &chunk.language != language {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if chunk.kind != kind {
                return false;
            }
        }
        if let Some(ref package) = self.package {
            if &chunk.package != package {
                return false;
            }
        }
        if let Some(ref file_path) = self.file_path {
            if &chunk.file_path != file_path {
                return false;
            }
        }
        true
    }
}

/// Abstract vector storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_batch`](VectorStore::insert_batch) | Upsert chunks with their embeddings |
/// | [`delete`](VectorStore::delete) | Remove every chunk of a project |
/// | [`search`](VectorStore::search) | Cosine similarity search with filters |
/// | [`list_projects`](VectorStore::list_projects) | Distinct project names, sorted |
/// | [`get`](VectorStore::get) | Fetch one chunk by ID |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert chunks and their vectors. `chunks` and `vectors` must be the
    /// same length.
    async fn insert_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Delete every chunk belonging to `project`. Deleting an unknown
    /// project is not an error.
    async fn delete(&self, project: &str) -> Result<()>;

    /// Return up to `limit` chunks closest to `query`, best first.
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>>;

    async fn list_projects(&self) -> Result<Vec<String>>;

    async fn get(&self, id: &str) -> Result<Option<Chunk>>;
}

/// Reject mismatched chunk/vector batches before any write happens.
pub fn check_batch(chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != vectors.len() {
        anyhow::bail!(
            "chunks and embeddings length mismatch: {} vs {}",
            chunks.len(),
            vectors.len()
        );
    }
    Ok(())
}

/// Sort results best-first and keep the top `limit`.
pub fn rank(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
    results
}
