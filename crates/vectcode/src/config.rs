//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, via [`load_or_default`]) yields a working local setup that talks to
//! Ollama on `localhost` and keeps its databases under `~/.vectcode/`.
//!
//! ```toml
//! [db]
//! path = "~/.vectcode/metadata.db"
//!
//! [vector_store]
//! path = "~/.vectcode/vectors.db"
//! batch_size = 1000
//!
//! [embedding]
//! provider = "ollama"   # ollama | openai | disabled
//! model = "bge-m3"
//! url = "http://localhost:11434"
//! dims = 1024
//!
//! [index]
//! exclude_globs = ["**/testdata/**"]
//! ```

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("~/.vectcode/metadata.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_path")]
    pub path: PathBuf,
    #[serde(default = "default_store_batch_size")]
    pub batch_size: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            path: default_vector_path(),
            batch_size: default_store_batch_size(),
        }
    }
}

fn default_vector_path() -> PathBuf {
    PathBuf::from("~/.vectcode/vectors.db")
}
fn default_store_batch_size() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            url: default_url(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_model() -> String {
    "bge-m3".to_string()
}
fn default_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_dims() -> usize {
    1024
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    /// Globs matched against root-relative paths. Matching files and
    /// directories are skipped.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl IndexConfig {
    pub fn exclude_set(&self) -> Result<GlobSet> {
        build_globset(&self.exclude_globs)
    }
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid exclude glob: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

impl Config {
    /// Expand `~/` in configured paths against the user's home directory.
    fn expand_paths(mut self) -> Self {
        self.db.path = expand_home(&self.db.path);
        self.vector_store.path = expand_home(&self.vector_store.path);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.vector_store.batch_size == 0 {
            bail!("vector_store.batch_size must be > 0");
        }

        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "ollama" | "openai" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be ollama, openai, or disabled.",
                other
            ),
        }

        if self.embedding.is_enabled() {
            if self.embedding.dims == 0 {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.trim().is_empty() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
        }

        self.index.exclude_set()?;
        Ok(())
    }
}

/// Replace a leading `~` with the home directory. Other paths pass through.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

/// Default config location, `~/.vectcode/config.toml`.
pub fn default_config_path() -> PathBuf {
    expand_home(Path::new("~/.vectcode/config.toml"))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config.expand_paths())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        log::debug!("no config at {}, using defaults", path.display());
        Ok(Config::default().expand_paths())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.model, "bge-m3");
        assert_eq!(config.embedding.url, "http://localhost:11434");
        assert_eq!(config.embedding.dims, 1024);
        assert_eq!(config.vector_store.batch_size, 1000);
        assert!(config.db.path.ends_with(".vectcode/metadata.db"));
        assert!(config.index.exclude_globs.is_empty());
    }

    #[test]
    fn test_explicit_values() {
        let config = parse_config(
            r#"
            [db]
            path = "/tmp/meta.db"

            [vector_store]
            path = "/tmp/vec.db"
            batch_size = 50

            [embedding]
            provider = "openai"
            model = "text-embedding-3-small"
            dims = 1536

            [index]
            exclude_globs = ["**/testdata/**"]
            "#,
        )
        .unwrap();
        assert_eq!(config.db.path, PathBuf::from("/tmp/meta.db"));
        assert_eq!(config.vector_store.batch_size, 50);
        assert_eq!(config.embedding.dims, 1536);
        assert!(config
            .index
            .exclude_set()
            .unwrap()
            .is_match("internal/testdata/fixture.go"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = parse_config("[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(parse_config("[vector_store]\nbatch_size = 0\n").is_err());
        assert!(parse_config("[embedding]\nbatch_size = 0\n").is_err());
        assert!(parse_config("[embedding]\ndims = 0\n").is_err());
        assert!(parse_config("[embedding]\nprovider = \"disabled\"\ndims = 0\n").is_ok());
    }

    #[test]
    fn test_rejects_bad_glob() {
        assert!(parse_config("[index]\nexclude_globs = [\"a/[\"]\n").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.embedding.provider, "ollama");
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(
            expand_home(Path::new("/var/lib/x.db")),
            PathBuf::from("/var/lib/x.db")
        );
        let expanded = expand_home(Path::new("~/.vectcode/x.db"));
        assert!(!expanded.starts_with("~"));
    }
}
