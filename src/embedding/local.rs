//! In-process embeddings via fastembed.
//!
//! Models are downloaded from Hugging Face on first use and cached; after
//! that no network calls are made.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::{check_vectors, Embedder};

const PROVIDER: &str = "local";

pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    model: Arc<Mutex<fastembed::TextEmbedding>>,
    batch_size: usize,
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let kind = fastembed_model(&config.model)?;
        let model = fastembed::TextEmbedding::try_new(fastembed::InitOptions::new(kind))
            .map_err(|e| Error::Configuration(format!("failed to load local embedding model: {}", e)))?;
        Ok(Self {
            model_name: config.model.clone(),
            dims: config.dims,
            model: Arc::new(Mutex::new(model)),
            batch_size: config.batch_size,
        })
    }
}

fn fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => Err(Error::Configuration(format!(
            "unknown local embedding model: '{}'. Supported: all-minilm-l6-v2, \
             bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, nomic-embed-text-v1.5",
            other
        ))),
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
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
        let model = Arc::clone(&self.model);
        let input = texts.to_vec();
        let batch_size = self.batch_size;

        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model.lock().map_err(|_| Error::EmbeddingService {
                provider: PROVIDER.to_string(),
                message: "model lock poisoned".to_string(),
            })?;
            model
                .embed(input, Some(batch_size))
                .map_err(|e| Error::EmbeddingService {
                    provider: PROVIDER.to_string(),
                    message: e.to_string(),
                })
        })
        .await
        .map_err(|e| Error::EmbeddingService {
            provider: PROVIDER.to_string(),
            message: format!("embedding task failed: {}", e),
        })??;

        check_vectors(PROVIDER, texts.len(), self.dims, vectors)
    }
}
