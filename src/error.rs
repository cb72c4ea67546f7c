//! Error taxonomy for the RAG pipeline.
//!
//! Component-level failures (embedding service, generation service, vector
//! index, PDF extraction, configuration) are wrapped by the
//! [`RagEngine`](crate::engine::RagEngine) into [`Error::Ingest`] or
//! [`Error::Query`]. Nothing in the pipeline retries; callers decide.

use thiserror::Error;

/// Errors produced by the ingestion and question-answering pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The embedding backend failed (network, auth, rate limit, bad response).
    #[error("embedding service error ({provider}): {message}")]
    EmbeddingService { provider: String, message: String },

    /// The language-model backend failed.
    #[error("generation service error ({provider}): {message}")]
    GenerationService { provider: String, message: String },

    /// The vector index could not be read or written.
    #[error("vector index error: {0}")]
    Index(String),

    /// The uploaded document could not be read or parsed.
    #[error("document error: {0}")]
    Document(String),

    /// Missing API key, unknown provider, or embedding dimension mismatch.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Ingesting a document failed. Batches committed before the failure stay
    /// in the index.
    #[error("ingest of {path} failed: {inner}")]
    Ingest {
        path: String,
        #[source]
        inner: Box<Error>,
    },

    /// Answering a question failed.
    #[error("query failed: {0}")]
    Query(#[source] Box<Error>),
}

impl Error {
    pub(crate) fn ingest(path: impl Into<String>, inner: Error) -> Self {
        Error::Ingest {
            path: path.into(),
            inner: Box::new(inner),
        }
    }

    pub(crate) fn query(inner: Error) -> Self {
        Error::Query(Box::new(inner))
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Index(e.to_string())
    }
}

/// Convenience result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
