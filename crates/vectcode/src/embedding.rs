//! Embedding providers.
//!
//! Concrete [`Embedder`] implementations selected by `[embedding] provider`:
//! - **[`OllamaEmbedder`]** calls a local Ollama server (`POST /api/embed`).
//! - **[`OpenAiEmbedder`]** calls the OpenAI embeddings API.
//! - **[`DisabledEmbedder`]** fails every call; indexing and search need a
//!   real provider.
//!
//! # Retry Strategy
//!
//! Both HTTP providers share one request loop:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Batches larger than `embedding.batch_size` are split into several
//! requests; results are concatenated in input order.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use vectcode_core::embedding::Embedder;

use crate::config::EmbeddingConfig;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

// ============ Disabled Provider ============

/// Provider used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dimensions(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.")
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.")
    }
}

// ============ HTTP plumbing ============

/// Request settings shared by the HTTP providers.
struct HttpSettings {
    client: reqwest::Client,
    batch_size: usize,
    max_retries: u32,
}

impl HttpSettings {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    /// POST `body` to `url`, retrying transient failures with backoff.
    async fn post_json(
        &self,
        provider: &str,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                log::debug!(
                    "{} request retry {} in {:?}",
                    provider,
                    attempt,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(url).json(body);
            if let Some(token) = bearer {
                request = request.header("Authorization", format!("Bearer {}", token));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("{} API error {}: {}", provider, status, body_text));
                        continue;
                    }

                    bail!("{} API error {}: {}", provider, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!("{} request failed: {}", provider, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
    }
}

fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
    let values = value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid embedding: expected an array of numbers"))?;
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid embedding: non-numeric value"))
        })
        .collect()
}

fn check_count(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        bail!("Expected {} embeddings, provider returned {}", expected, got);
    }
    Ok(())
}

// ============ Ollama Provider ============

/// Embedding provider backed by a local Ollama server.
pub struct OllamaEmbedder {
    url: String,
    model: String,
    dims: usize,
    http: HttpSettings,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
            http: HttpSettings::new(config)?,
        })
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self
            .http
            .post_json(
                "Ollama",
                &format!("{}/api/embed", self.url),
                None,
                &body,
            )
            .await?;
        let vectors = parse_ollama_response(&json)?;
        check_count(texts.len(), vectors.len())?;
        Ok(vectors)
    }
}

/// Extract `embeddings[]` from an `/api/embed` response.
fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(parse_vector)
        .collect()
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_chunk(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No embeddings returned from Ollama"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.http.batch_size) {
            all.extend(self.embed_chunk(batch).await?);
        }
        Ok(all)
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    dims: usize,
    http: HttpSettings,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            api_key,
            model: config.model.clone(),
            dims: config.dims,
            http: HttpSettings::new(config)?,
        })
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self
            .http
            .post_json("OpenAI", OPENAI_EMBEDDINGS_URL, Some(&self.api_key), &body)
            .await?;
        let vectors = parse_openai_response(&json)?;
        check_count(texts.len(), vectors.len())?;
        Ok(vectors)
    }
}

/// Extract `data[].embedding` from an OpenAI response, ordered by `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, parse_vector(embedding)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_chunk(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.http.batch_size) {
            all.extend(self.embed_chunk(batch).await?);
        }
        Ok(all)
    }
}

/// Create the [`Embedder`] named by the configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] |
/// | `"disabled"` | [`DisabledEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
