//! In-memory [`VectorIndex`] for tests and throwaway sessions.
//!
//! Entries live in a `Vec` behind a tokio `RwLock`; search is brute-force
//! cosine similarity over every stored vector. A write holds the lock for
//! the whole batch, so readers see either none or all of it.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{Chunk, DocumentRecord, ScoredChunk};

use super::{check_batch, rank_top_k, VectorIndex};

pub struct InMemoryIndex {
    dims: usize,
    entries: RwLock<Vec<(Chunk, Vec<f32>)>>,
    documents: RwLock<Vec<DocumentRecord>>,
}

impl InMemoryIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            entries: RwLock::new(Vec::new()),
            documents: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn register_document(&self, record: &DocumentRecord) -> Result<()> {
        self.documents.write().await.push(record.clone());
        Ok(())
    }

    async fn add(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        check_batch(chunks, embeddings, self.dims)?;
        let mut entries = self.entries.write().await;
        entries.extend(chunks.iter().cloned().zip(embeddings.iter().cloned()));
        Ok(chunks.len())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.read().await;
        Ok(rank_top_k(query, entries.iter().cloned(), k))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.documents.read().await.len())
    }
}
