//! Error taxonomy for extraction, metadata tracking, and indexing runs.
//!
//! Collaborator seams (embedders, vector stores) speak `anyhow`; the
//! subsystems here wrap those errors so callers can tell which step failed.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while walking and parsing a project tree.
///
/// Only [`ExtractError::Traversal`] and [`ExtractError::InvalidRoot`] escape
/// a project scan. `Parse` and `Io` are per-file and are logged and skipped
/// by the walker.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to traverse {}: {source}", root.display())]
    Traversal {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("project root {} is not a directory", .0.display())]
    InvalidRoot(PathBuf),

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the metadata tracker.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    #[error("metadata database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MetadataError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn conflict(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Vector-store operation that failed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStep {
    Delete,
    Insert,
}

impl std::fmt::Display for StoreStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreStep::Delete => f.write_str("delete"),
            StoreStep::Insert => f.write_str("insert"),
        }
    }
}

/// Errors that abort an indexing run.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("no code chunks found in project {project}")]
    NoChunks { project: String },

    #[error("embedding failed: {0:#}")]
    Embedding(#[source] anyhow::Error),

    #[error("vector store {step} failed: {source:#}")]
    VectorStore {
        step: StoreStep,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The vector store holds the new chunks but the metadata rows could
    /// not be updated to match.
    #[error("indexed {chunk_count} chunks but failed to update metadata: {source}")]
    MetadataSync {
        chunk_count: usize,
        #[source]
        source: MetadataError,
    },
}
