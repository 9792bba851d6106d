//! # vectcode
//!
//! **A structural code indexer for Go repositories.**
//!
//! vectcode parses Go source with tree-sitter, turns every top-level
//! function, method, struct and interface into a [`Chunk`], embeds the
//! chunks, and stores them in a vector store for semantic search. A
//! relational metadata tracker records projects, project groups and
//! per-file indexing timestamps so stale files can be found later.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Extractor  │──▶│  Embedder   │──▶│ Vector store │
//! │ tree-sitter │   │ Ollama/OAI  │   │ SQLite BLOBs │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//!                   ┌──────────────┐         │
//!                   │   Metadata   │◀────────┘ (after a successful write)
//!                   │ groups/files │
//!                   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`extract`] | Directory walk and Go chunk extraction |
//! | [`embedding`] | Ollama and OpenAI embedders with retry |
//! | [`sqlite_store`] | SQLite [`VectorStore`] |
//! | [`metadata`] | Groups, projects and tracked files |
//! | [`indexer`] | The clean → extract → embed → store → sync pipeline |
//! | [`search`] | Project, group and global scoped search |
//! | [`config`] | TOML configuration |
//! | [`commands`] | CLI command implementations |
//!
//! Backend-agnostic types and traits live in [`vectcode_core`] and are
//! re-exported here.

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod indexer;
pub mod metadata;
pub mod migrate;
pub mod search;
pub mod sqlite_store;

pub use vectcode_core;
pub use vectcode_core::{
    chunk_id, Chunk, ChunkKind, Embedder, SearchFilters, SearchResult, VectorStore,
};

pub use error::{ExtractError, IndexError, MetadataError};
pub use extract::{GoExtractor, LanguageExtractor};
pub use indexer::{IndexReport, IndexRequest, Indexer};
pub use metadata::MetadataStore;
pub use search::{search_code, SearchScope};
pub use sqlite_store::SqliteVectorStore;
