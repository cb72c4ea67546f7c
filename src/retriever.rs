//! Top-k retrieval over the vector index.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::models::ScoredChunk;
use crate::store::VectorIndex;

pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    /// `top_k` comes from configuration; callers cannot change it per query.
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Embed `question` and return at most `top_k` chunks, most similar first.
    ///
    /// Returns an empty vec when the index is empty.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let query = self.embedder.embed(question).await?;
        let hits = self.index.search(&query, self.top_k).await?;
        debug!(k = self.top_k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}
