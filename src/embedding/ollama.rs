use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::{check_vectors, http_client, Embedder};

const PROVIDER: &str = "ollama";

pub(crate) const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Embedding backend using a local Ollama instance's `/api/embed` endpoint.
///
/// Requires Ollama to be running with the model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        PROVIDER
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::EmbeddingService {
                provider: PROVIDER.to_string(),
                message: format!("connection error (is Ollama running at {}?): {}", self.url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::EmbeddingService {
                provider: PROVIDER.to_string(),
                message: format!("API returned {}: {}", status, text),
            });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| Error::EmbeddingService {
            provider: PROVIDER.to_string(),
            message: format!("invalid response: {}", e),
        })?;

        check_vectors(PROVIDER, texts.len(), self.dims, parsed.embeddings)
    }
}
