//! Metadata entities tracked across indexing runs.
//!
//! These types mirror the rows of the metadata database: [`Group`]s of
//! [`Project`]s, and per-file [`TrackedFile`] state used for staleness
//! detection. Nullable timestamps are `Option`s so that "never indexed"
//! and "unknown modification time" stay distinct from any real instant.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A named collection of projects, used for group-scoped search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An indexed repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub language: String,
    pub description: String,
    pub group_id: Option<i64>,
    /// Populated from the groups table when the project is read back.
    pub group_name: Option<String>,
    /// Chunk total of the last successful indexing run.
    pub chunk_count: i64,
    /// `None` means the project has never been indexed.
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a project row.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub path: String,
    pub language: String,
    pub description: String,
    pub group_id: Option<i64>,
    pub chunk_count: i64,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

/// Optional filters for listing projects. Empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub group_id: Option<i64>,
    pub group_name: Option<String>,
    pub name: Option<String>,
}

impl ProjectFilter {
    pub fn by_group(name: impl Into<String>) -> Self {
        Self {
            group_name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Indexing state of one source file inside a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedFile {
    /// Zero until the row has been stored.
    pub id: i64,
    pub project_id: i64,
    /// Relative to the project root.
    pub file_path: String,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub chunk_count: i64,
    /// SHA-256 hex of the file contents.
    pub file_hash: String,
}

impl TrackedFile {
    /// A file is stale when it was never indexed, or was modified after its
    /// last indexing.
    pub fn is_stale(&self) -> bool {
        match (self.last_indexed_at, self.last_modified_at) {
            (None, _) => true,
            (Some(indexed), Some(modified)) => modified > indexed,
            (Some(_), None) => false,
        }
    }
}
