//! Structural extraction: project tree in, chunks out.
//!
//! A [`LanguageExtractor`] walks a project root and parses every source
//! file of its language. Only Go is implemented ([`GoExtractor`]).
//!
//! # Traversal
//!
//! - `vendor/`, `node_modules/`, and hidden directories (names longer than
//!   one character starting with `.`) are not descended. The root itself is
//!   always walked.
//! - Paths matching the configured exclude globs are skipped.
//! - Entries are visited in file-name order, so output is stable for an
//!   unchanged tree.
//!
//! An unreadable directory aborts the walk. A file that cannot be read or
//! parsed is logged at `warn` and skipped.

pub mod go;

use chrono::{DateTime, Utc};
use globset::GlobSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use vectcode_core::chunk::{content_hash, Chunk};

use crate::error::ExtractError;
use go::{FileContext, GoParser};

/// Facts about one parsed source file, used for the tracker's file rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    /// Relative to the project root, `/`-separated.
    pub path: String,
    /// `None` when the filesystem reports no modification time.
    pub modified: Option<DateTime<Utc>>,
    pub hash: String,
    pub chunk_count: usize,
}

/// Result of walking one project.
#[derive(Debug, Clone, Default)]
pub struct ProjectScan {
    pub chunks: Vec<Chunk>,
    pub files: Vec<ScannedFile>,
}

/// Per-language extraction contract.
pub trait LanguageExtractor: Send + Sync {
    /// Language tag stamped on every chunk, e.g. `"go"`.
    fn language(&self) -> &'static str;

    /// Walk `root` and parse every file of this language.
    fn scan_project(&self, root: &Path, project: &str) -> Result<ProjectScan, ExtractError>;

    /// Like [`scan_project`](LanguageExtractor::scan_project), chunks only.
    fn extract_project(&self, root: &Path, project: &str) -> Result<Vec<Chunk>, ExtractError> {
        Ok(self.scan_project(root, project)?.chunks)
    }
}

/// Extractor for Go projects.
#[derive(Debug, Clone)]
pub struct GoExtractor {
    excludes: GlobSet,
}

impl GoExtractor {
    pub fn new() -> Self {
        Self::with_excludes(GlobSet::empty())
    }

    pub fn with_excludes(excludes: GlobSet) -> Self {
        Self { excludes }
    }
}

impl Default for GoExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for GoExtractor {
    fn language(&self) -> &'static str {
        go::LANGUAGE
    }

    fn scan_project(&self, root: &Path, project: &str) -> Result<ProjectScan, ExtractError> {
        if !root.is_dir() {
            return Err(ExtractError::InvalidRoot(root.to_path_buf()));
        }

        let mut parser = GoParser::new()?;
        let mut scan = ProjectScan::default();

        for path in source_files(root, "go", &self.excludes)? {
            let relative = relative_path(root, &path);
            match parse_file(&mut parser, &path, &relative, project) {
                Ok((chunks, file)) => {
                    log::debug!("{}: {} chunks", relative, chunks.len());
                    scan.chunks.extend(chunks);
                    scan.files.push(file);
                }
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }

        log::info!(
            "extracted {} chunks from {} files in {}",
            scan.chunks.len(),
            scan.files.len(),
            root.display()
        );
        Ok(scan)
    }
}

fn parse_file(
    parser: &mut GoParser,
    path: &Path,
    relative: &str,
    project: &str,
) -> Result<(Vec<Chunk>, ScannedFile), ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::io(path, e))?;
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    let source = std::str::from_utf8(&bytes)
        .map_err(|e| ExtractError::parse(path, format!("not valid UTF-8: {e}")))?;

    let ctx = FileContext {
        project,
        file_path: relative,
        last_modified: modified.unwrap_or_else(Utc::now),
    };
    let chunks = parser.parse_source(source, &ctx)?;

    let file = ScannedFile {
        path: relative.to_string(),
        modified,
        hash: content_hash(&bytes),
        chunk_count: chunks.len(),
    };
    Ok((chunks, file))
}

/// Files under `root` with the given extension, in traversal order.
fn source_files(
    root: &Path,
    extension: &str,
    excludes: &GlobSet,
) -> Result<Vec<PathBuf>, ExtractError> {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped(root, entry, excludes));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| ExtractError::Traversal {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(extension)
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_skipped(root: &Path, entry: &DirEntry, excludes: &GlobSet) -> bool {
    if entry.depth() == 0 {
        return false;
    }

    if entry.file_type().is_dir() {
        let name = entry.file_name().to_string_lossy();
        if name == "vendor" || name == "node_modules" {
            return true;
        }
        if name.len() > 1 && name.starts_with('.') {
            return true;
        }
    }

    !excludes.is_empty() && excludes.is_match(relative_path(root, entry.path()))
}

/// Root-relative path with `/` separators on every platform.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
