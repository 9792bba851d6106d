//! Code chunk model and identity scheme.
//!
//! A [`Chunk`] is one independently embeddable unit of source code: a
//! function, a method, or a struct/interface type declaration, together
//! with the structural metadata the extractor found around it.
//!
//! # Identity
//!
//! Every chunk carries a deterministic ID built by [`chunk_id`] from
//! `(project, file_path, name)`. The same unit parsed twice yields the same
//! ID, which is what lets vector stores treat a re-index as an upsert
//! instead of a duplicate insert. The format `"<project>:<file_path>:<name>"`
//! is persisted in every store and must not change.
//!
//! # Text projection
//!
//! [`Chunk::to_text`] renders the chunk as the text that is sent to the
//! embedding provider: documentation first, then a short header, then the
//! raw source.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The closed set of declaration kinds the extractor emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Method,
    Struct,
    Interface,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Method => "method",
            ChunkKind::Struct => "struct",
            ChunkKind::Interface => "interface",
        }
    }

    /// Parse from the lowercase string form used in storage and filters.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(ChunkKind::Function),
            "method" => Some(ChunkKind::Method),
            "struct" => Some(ChunkKind::Struct),
            "interface" => Some(ChunkKind::Interface),
            _ => None,
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted code unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `"<project>:<file_path>:<name>"`, see [`chunk_id`].
    pub id: String,
    pub project: String,
    /// Path relative to the project root, `/`-separated.
    pub file_path: String,
    /// Enclosing package / namespace.
    pub package: String,
    /// Language tag, e.g. `"go"`.
    pub language: String,
    pub kind: ChunkKind,
    pub name: String,
    /// Receiver type as written in source (`T`, `*T`). Methods only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Raw source text of the declaration.
    pub code: String,
    /// 1-based, inclusive.
    pub line_start: usize,
    /// 1-based, inclusive. Never less than `line_start`.
    pub line_end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Inbound entry points such as `"POST /api/users"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_endpoints: Vec<String>,
    /// Outbound HTTP call targets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_calls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    /// Modification time of the owning file when it was parsed.
    pub last_modified: DateTime<Utc>,
}

impl Chunk {
    /// Render the chunk as embedding input.
    pub fn to_text(&self) -> String {
        let mut text = String::new();

        if let Some(doc) = self.doc.as_deref().filter(|d| !d.is_empty()) {
            text.push_str(doc);
            text.push_str("\n\n");
        }

        text.push_str(&format!("Project: {}\n", self.project));
        text.push_str(&format!("Package: {}\n", self.package));
        text.push_str(&format!("Type: {}\n", self.kind));

        if !self.name.is_empty() {
            text.push_str(&format!("Name: {}\n", self.name));
        }

        if !self.http_endpoints.is_empty() {
            text.push_str(&format!(
                "HTTP Endpoints: {}\n",
                self.http_endpoints.join(", ")
            ));
        }

        if !self.imports.is_empty() {
            text.push_str(&format!("Imports: {}\n", self.imports.join(", ")));
        }

        text.push_str("\nCode:\n");
        text.push_str(&self.code);
        text
    }

    /// Human-readable `file:start-end` location.
    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.line_start, self.line_end)
    }
}

/// Build the deterministic chunk ID for a unit.
///
/// Pure function of its inputs; re-parsing an unchanged unit always yields
/// the same ID.
pub fn chunk_id(project: &str, file_path: &str, name: &str) -> String {
    format!("{}:{}:{}", project, file_path, name)
}

/// SHA-256 hex digest of a file's bytes, used for the tracked file hash.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Chunk {
        Chunk {
            id: chunk_id("proj", "api/handler.go", "Serve"),
            project: "proj".to_string(),
            file_path: "api/handler.go".to_string(),
            package: "api".to_string(),
            language: "go".to_string(),
            kind: ChunkKind::Method,
            name: "Serve".to_string(),
            receiver: Some("*Server".to_string()),
            code: "func (s *Server) Serve() {}".to_string(),
            line_start: 10,
            line_end: 12,
            doc: Some("Serve starts the server.\n".to_string()),
            http_endpoints: vec!["GET /health".to_string(), "POST /users".to_string()],
            http_calls: Vec::new(),
            imports: vec!["net/http".to_string(), "fmt".to_string()],
            last_modified: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id("proj", "file.go", "Foo"), "proj:file.go:Foo");
        assert_eq!(
            chunk_id("svc", "internal/db/conn.go", "Open"),
            "svc:internal/db/conn.go:Open"
        );
    }

    #[test]
    fn test_chunk_id_deterministic() {
        assert_eq!(chunk_id("a", "b.go", "C"), chunk_id("a", "b.go", "C"));
        assert_ne!(chunk_id("a", "b.go", "C"), chunk_id("a", "b.go", "D"));
    }

    #[test]
    fn test_to_text_layout() {
        let text = sample().to_text();
        let expected = "Serve starts the server.\n\n\n\
                        Project: proj\n\
                        Package: api\n\
                        Type: method\n\
                        Name: Serve\n\
                        HTTP Endpoints: GET /health, POST /users\n\
                        Imports: net/http, fmt\n\
                        \nCode:\n\
                        func (s *Server) Serve() {}";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_to_text_omits_empty_sections() {
        let mut chunk = sample();
        chunk.doc = None;
        chunk.http_endpoints.clear();
        chunk.imports.clear();

        let text = chunk.to_text();
        assert!(text.starts_with("Project: proj\n"));
        assert!(!text.contains("HTTP Endpoints"));
        assert!(!text.contains("Imports"));
        assert!(text.ends_with("\nCode:\nfunc (s *Server) Serve() {}"));
    }

    #[test]
    fn test_kind_round_trip_through_str() {
        for kind in [
            ChunkKind::Function,
            ChunkKind::Method,
            ChunkKind::Struct,
            ChunkKind::Interface,
        ] {
            assert_eq!(ChunkKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ChunkKind::parse("package"), None);
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["kind"], "method");
        assert_eq!(json["receiver"], "*Server");
        assert!(json.get("http_calls").is_none());
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let hash = content_hash(b"package main\n");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash(b"package main\n"));
        assert_ne!(hash, content_hash(b"package other\n"));
    }
}
