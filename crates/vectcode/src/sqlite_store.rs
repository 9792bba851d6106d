//! SQLite-backed [`VectorStore`] implementation.
//!
//! Chunks are stored as serialized JSON next to their embedding BLOB in the
//! `code_chunks` table, keyed by chunk ID. Search loads the candidate rows
//! for the project scope and ranks them by brute-force cosine similarity.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::path::Path;

use vectcode_core::chunk::Chunk;
use vectcode_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use vectcode_core::store::{
    check_batch, rank, SearchFilters, SearchResult, VectorStore, DEFAULT_BATCH_SIZE,
};

use crate::db;
use crate::migrate;

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    batch_size: usize,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Connect to `path` and create the chunk table if needed.
    pub async fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_vector_migrations(&pool).await?;
        Ok(Self::new(pool).with_batch_size(batch_size))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Number of stored chunks for `project`.
    pub async fn count(&self, project: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM code_chunks WHERE project = ?")
            .bind(project)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn decode_chunk(json: &str) -> Result<Chunk> {
    serde_json::from_str(json).context("Corrupt chunk row in vector store")
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_batch(chunks, vectors)?;

        for (batch_chunks, batch_vectors) in chunks
            .chunks(self.batch_size)
            .zip(vectors.chunks(self.batch_size))
        {
            let mut tx = self.pool.begin().await?;
            for (chunk, vector) in batch_chunks.iter().zip(batch_vectors) {
                let json = serde_json::to_string(chunk)?;
                sqlx::query(
                    r#"
                    INSERT INTO code_chunks (id, project, chunk_json, embedding)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        project = excluded.project,
                        chunk_json = excluded.chunk_json,
                        embedding = excluded.embedding
                    "#,
                )
                .bind(&chunk.id)
                .bind(&chunk.project)
                .bind(&json)
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            log::debug!("stored batch of {} chunks", batch_chunks.len());
        }
        Ok(())
    }

    async fn delete(&self, project: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM code_chunks WHERE project = ?")
            .bind(project)
            .execute(&self.pool)
            .await?;
        log::debug!(
            "deleted {} chunks for project {}",
            result.rows_affected(),
            project
        );
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        // Project scoping is pushed into SQL; the remaining filters apply to
        // the decoded chunk.
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT chunk_json, embedding FROM code_chunks WHERE 1 = 1");
        if let Some(ref project) = filters.project {
            builder.push(" AND project = ").push_bind(project.clone());
        }
        if !filters.projects.is_empty() {
            builder.push(" AND project IN (");
            let mut separated = builder.separated(", ");
            for project in &filters.projects {
                separated.push_bind(project.clone());
            }
            separated.push_unseparated(")");
        }

        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let json: String = row.get("chunk_json");
            let blob: Vec<u8> = row.get("embedding");
            let chunk = decode_chunk(&json)?;
            if !filters.matches(&chunk) {
                continue;
            }
            let similarity = cosine_similarity(query, &blob_to_vec(&blob));
            results.push(SearchResult::from_similarity(chunk, similarity));
        }

        Ok(rank(results, limit))
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let projects: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT project FROM code_chunks ORDER BY project")
                .fetch_all(&self.pool)
                .await?;
        Ok(projects)
    }

    async fn get(&self, id: &str) -> Result<Option<Chunk>> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT chunk_json FROM code_chunks WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        json.as_deref().map(decode_chunk).transpose()
    }
}
