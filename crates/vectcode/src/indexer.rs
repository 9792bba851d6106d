//! Indexing orchestration.
//!
//! One [`Indexer::index_project`] call runs the whole pipeline for a
//! project:
//!
//! ```text
//! [clean] → extract → embed → vector store write → metadata sync
//! ```
//!
//! Nothing touches the metadata tracker until the vector store write has
//! succeeded, so a failed run never records a chunk count the searchable
//! store does not have. The reverse is not guaranteed: if the metadata
//! sync fails after a successful write, the error is
//! [`IndexError::MetadataSync`] and the vector store keeps the new chunks.
//!
//! Without `clean`, re-indexing is an upsert by chunk ID. Chunks for units
//! that disappeared from the source stay in the vector store until the next
//! clean run.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use vectcode_core::chunk::Chunk;
use vectcode_core::embedding::Embedder;
use vectcode_core::models::{NewProject, TrackedFile};
use vectcode_core::store::VectorStore;

use crate::error::{IndexError, MetadataError, StoreStep};
use crate::extract::{LanguageExtractor, ProjectScan};
use crate::metadata::MetadataStore;

/// Parameters for one indexing run.
#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub path: PathBuf,
    pub name: String,
    pub group: Option<String>,
    pub description: Option<String>,
    /// Delete the project's existing vectors and metadata first.
    pub clean: bool,
}

impl IndexRequest {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            group: None,
            description: None,
            clean: false,
        }
    }

    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexReport {
    pub project: String,
    pub chunk_count: usize,
    pub file_count: usize,
    pub cleaned: bool,
    pub group: Option<String>,
}

pub struct Indexer {
    extractor: Arc<dyn LanguageExtractor>,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    metadata: Arc<MetadataStore>,
}

impl Indexer {
    pub fn new(
        extractor: Arc<dyn LanguageExtractor>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        metadata: Arc<MetadataStore>,
    ) -> Self {
        Self {
            extractor,
            embedder,
            vector_store,
            metadata,
        }
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub async fn index_project(&self, request: &IndexRequest) -> Result<IndexReport, IndexError> {
        let name = request.name.as_str();
        log::info!("indexing {} from {}", name, request.path.display());

        if request.clean {
            self.clean_project(name).await?;
        }

        // Files edited after this instant must come out stale, even if the
        // edit lands while the run is still embedding.
        let started = Utc::now();
        let scan = self.extractor.scan_project(&request.path, name)?;
        if scan.chunks.is_empty() {
            return Err(IndexError::NoChunks {
                project: name.to_string(),
            });
        }
        let chunk_count = scan.chunks.len();

        let vectors = self.embed_chunks(&scan.chunks).await?;

        self.vector_store
            .insert_batch(&scan.chunks, &vectors)
            .await
            .map_err(|source| IndexError::VectorStore {
                step: StoreStep::Insert,
                source,
            })?;
        log::info!("stored {} chunks for {}", chunk_count, name);

        self.sync_metadata(request, &scan, started)
            .await
            .map_err(|source| IndexError::MetadataSync {
                chunk_count,
                source,
            })?;

        Ok(IndexReport {
            project: name.to_string(),
            chunk_count,
            file_count: scan.files.len(),
            cleaned: request.clean,
            group: request.group.clone(),
        })
    }

    /// Remove a project from the vector store, then from the tracker.
    ///
    /// A project with no metadata row is not an error.
    pub async fn delete_project(&self, name: &str) -> Result<(), IndexError> {
        self.vector_store
            .delete(name)
            .await
            .map_err(|source| IndexError::VectorStore {
                step: StoreStep::Delete,
                source,
            })?;

        match self.metadata.delete_project(name).await {
            Ok(()) => {}
            Err(MetadataError::NotFound { .. }) => {
                log::warn!("project {} had no metadata to delete", name);
            }
            Err(e) => return Err(e.into()),
        }
        log::info!("deleted project {}", name);
        Ok(())
    }

    async fn clean_project(&self, name: &str) -> Result<(), IndexError> {
        log::info!("cleaning existing data for {}", name);
        self.vector_store
            .delete(name)
            .await
            .map_err(|source| IndexError::VectorStore {
                step: StoreStep::Delete,
                source,
            })?;

        match self.metadata.delete_project(name).await {
            Ok(()) | Err(MetadataError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, IndexError> {
        let texts: Vec<String> = chunks.iter().map(Chunk::to_text).collect();
        log::debug!(
            "embedding {} chunks with {}",
            texts.len(),
            self.embedder.model_name()
        );

        let vectors = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(IndexError::Embedding)?;

        if vectors.len() != chunks.len() {
            return Err(IndexError::Embedding(anyhow::anyhow!(
                "expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    /// `indexed_at` is the scan start, stamped on the project and every file.
    async fn sync_metadata(
        &self,
        request: &IndexRequest,
        scan: &ProjectScan,
        indexed_at: DateTime<Utc>,
    ) -> Result<(), MetadataError> {
        let group_id = match request.group.as_deref() {
            Some(group) => Some(self.metadata.get_or_create_group(group).await?.id),
            None => None,
        };

        let path = std::fs::canonicalize(&request.path)
            .unwrap_or_else(|_| request.path.clone())
            .display()
            .to_string();
        let language = self.extractor.language().to_string();
        let chunk_count = scan.chunks.len() as i64;
        let last_modified_at = scan.files.iter().filter_map(|f| f.modified).max();

        let project = match self.metadata.get_project(&request.name).await {
            Ok(mut existing) => {
                existing.path = path;
                existing.language = language;
                if let Some(ref description) = request.description {
                    existing.description = description.clone();
                }
                if group_id.is_some() {
                    existing.group_id = group_id;
                }
                existing.chunk_count = chunk_count;
                existing.last_indexed_at = Some(indexed_at);
                existing.last_modified_at = last_modified_at;
                self.metadata.update_project(&existing).await?
            }
            Err(MetadataError::NotFound { .. }) => {
                self.metadata
                    .create_project(&NewProject {
                        name: request.name.clone(),
                        path,
                        language,
                        description: request.description.clone().unwrap_or_default(),
                        group_id,
                        chunk_count,
                        last_indexed_at: Some(indexed_at),
                        last_modified_at,
                    })
                    .await?
            }
            Err(e) => return Err(e),
        };

        for file in &scan.files {
            self.metadata
                .upsert_file(&TrackedFile {
                    id: 0,
                    project_id: project.id,
                    file_path: file.path.clone(),
                    last_modified_at: file.modified,
                    last_indexed_at: Some(indexed_at),
                    chunk_count: file.chunk_count as i64,
                    file_hash: file.hash.clone(),
                })
                .await?;
        }

        log::debug!(
            "tracked {} files for project {} (id {})",
            scan.files.len(),
            project.name,
            project.id
        );
        Ok(())
    }
}
