//! # vectcode core
//!
//! Shared, I/O-free building blocks for vectcode: the code chunk model and
//! its identity scheme, the metadata entities used for staleness tracking,
//! and the [`embedding::Embedder`] and [`store::VectorStore`] contracts the
//! indexing pipeline talks to.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod store;

pub use chunk::{chunk_id, Chunk, ChunkKind};
pub use embedding::Embedder;
pub use store::{SearchFilters, SearchResult, VectorStore};
