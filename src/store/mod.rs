//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only way the pipeline touches stored
//! chunks, so backends can be swapped without changing orchestration:
//!
//! | Backend | Persistence | Use |
//! |---------|-------------|-----|
//! | [`SqliteIndex`] | SQLite file (WAL) | server and CLI |
//! | [`InMemoryIndex`] | none | tests, throwaway sessions |
//!
//! Both backends are append-only. Adding the same document twice stores its
//! chunks twice; there is no deduplication.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{Chunk, DocumentRecord, ScoredChunk};

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

/// Persistent store of (vector, chunk) entries with nearest-neighbour search.
///
/// Implementations must let `search` run concurrently with `add` without
/// exposing a partially written batch.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Dimensionality every stored vector has.
    fn dims(&self) -> usize;

    /// Record that a document is being ingested.
    async fn register_document(&self, record: &DocumentRecord) -> Result<()>;

    /// Append chunks with their embeddings, one embedding per chunk.
    ///
    /// The batch is durable when this returns. Returns the number of entries added.
    async fn add(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize>;

    /// Up to `k` entries by descending cosine similarity, ties in insertion order.
    ///
    /// An empty index yields an empty vec, never an error.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored chunks.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Number of ingest calls recorded.
    async fn document_count(&self) -> Result<usize>;
}

/// Reject batches whose shape doesn't match the index.
pub(crate) fn check_batch(chunks: &[Chunk], embeddings: &[Vec<f32>], dims: usize) -> Result<()> {
    if chunks.len() != embeddings.len() {
        return Err(Error::Index(format!(
            "got {} embeddings for {} chunks",
            embeddings.len(),
            chunks.len()
        )));
    }
    if let Some(bad) = embeddings.iter().find(|v| v.len() != dims) {
        return Err(Error::Index(format!(
            "embedding has {} dimensions, index expects {}",
            bad.len(),
            dims
        )));
    }
    Ok(())
}

/// Score entries given in insertion order and keep the best `k`.
///
/// The sort is stable, so equal scores keep insertion order.
pub(crate) fn rank_top_k<I>(query: &[f32], entries: I, k: usize) -> Vec<ScoredChunk>
where
    I: IntoIterator<Item = (Chunk, Vec<f32>)>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<ScoredChunk> = entries
        .into_iter()
        .map(|(chunk, vector)| ScoredChunk {
            score: cosine_similarity(query, &vector),
            chunk,
        })
        .collect();

    // total order, so a NaN score from a bad vector cannot break the sort
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}
