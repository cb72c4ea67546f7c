//! Embedding capability and backends.
//!
//! Defines the [`Embedder`] trait and its implementations:
//! - **[`OpenAIEmbedder`]**: `POST {base_url}/embeddings` on the OpenAI API.
//! - **[`OllamaEmbedder`]**: `POST /api/embed` on a local Ollama instance.
//! - **`LocalEmbedder`**: in-process fastembed models (feature
//!   `local-embeddings-fastembed`).
//!
//! Also provides vector utilities used by the index:
//! - [`cosine_similarity`]: similarity between two vectors
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` BLOB encoding
//!
//! # Failure policy
//!
//! Backends make exactly one request per batch. Network errors, non-2xx
//! responses, and malformed bodies all surface as
//! [`Error::EmbeddingService`]; retrying is left to the caller.

#[cfg(feature = "local-embeddings-fastembed")]
mod local;
mod ollama;
mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalEmbedder;
pub(crate) use ollama::DEFAULT_OLLAMA_URL;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAIEmbedder;
pub(crate) use openai::error_detail as openai_error_detail;

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Backend label used in errors and logs (e.g. `"openai"`).
    fn provider(&self) -> &str {
        "embedder"
    }

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per text in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| Error::EmbeddingService {
            provider: self.provider().to_string(),
            message: "empty embedding response".to_string(),
        })
    }
}

/// Create the [`Embedder`] selected by `config.provider`.
///
/// # Errors
///
/// [`Error::Configuration`] for a missing API key, an unknown provider, or a
/// provider whose feature flag is not compiled in.
pub fn create_embedder(config: &EmbeddingConfig, api_key: Option<&str>) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => {
            let key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                Error::Configuration(format!(
                    "{} must be set for the openai embedding provider",
                    crate::config::API_KEY_ENV
                ))
            })?;
            Ok(Arc::new(OpenAIEmbedder::new(config, key)?))
        }
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(Error::Configuration(
            "local embedding provider requires --features local-embeddings-fastembed".to_string(),
        )),
        other => Err(Error::Configuration(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Build a reqwest client, with a request timeout only if one is configured.
pub(crate) fn http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {}", e)))
}

/// Verify a backend returned one vector of the right size per input.
pub(crate) fn check_vectors(
    provider: &str,
    expected_count: usize,
    dims: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(Error::EmbeddingService {
            provider: provider.to_string(),
            message: format!(
                "expected {} embeddings, got {}",
                expected_count,
                vectors.len()
            ),
        });
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != dims) {
        return Err(Error::EmbeddingService {
            provider: provider.to_string(),
            message: format!(
                "model returned {} dimensions, configured embedding.dims is {}",
                v.len(),
                dims
            ),
        });
    }
    Ok(vectors)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use intellidoc::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_check_vectors() {
        assert!(check_vectors("t", 2, 2, vec![vec![0.0, 1.0], vec![1.0, 0.0]]).is_ok());
        let err = check_vectors("t", 2, 2, vec![vec![0.0, 1.0]]).unwrap_err();
        assert!(matches!(err, Error::EmbeddingService { .. }));
        let err = check_vectors("t", 1, 3, vec![vec![0.0, 1.0]]).unwrap_err();
        assert!(err.to_string().contains("3"));
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = EmbeddingConfig::default();
        let err = create_embedder(&config, None).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
        let err = create_embedder(&config, Some("")).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(create_embedder(&config, Some("sk-test")).is_ok());
    }

    struct SilentEmbedder;

    #[async_trait]
    impl Embedder for SilentEmbedder {
        fn model_name(&self) -> &str {
            "silent-model"
        }

        fn provider(&self) -> &str {
            "silent"
        }

        fn dims(&self) -> usize {
            2
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_empty_response_names_provider() {
        let err = SilentEmbedder.embed("hello").await.unwrap_err();
        match err {
            Error::EmbeddingService { provider, message } => {
                assert_eq!(provider, "silent");
                assert!(message.contains("empty"));
            }
            other => panic!("expected embedding error, got {:?}", other),
        }
    }

    #[test]
    fn test_backends_report_provider() {
        let config = EmbeddingConfig::default();
        let embedder = create_embedder(&config, Some("sk-test")).unwrap();
        assert_eq!(embedder.provider(), "openai");

        let config = EmbeddingConfig {
            provider: "ollama".into(),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config, None).unwrap();
        assert_eq!(embedder.provider(), "ollama");
    }

    #[test]
    fn test_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "cohere".into(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config, Some("k")).is_err());
    }
}
