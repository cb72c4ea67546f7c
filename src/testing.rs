//! Deterministic stand-ins for the model backends, shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::generation::{ChatMessage, Generator};
use crate::models::Chunk;
use crate::prompt::{ANSWER_SYSTEM_PROMPT, CONTEXT_SEPARATOR, REWRITE_SYSTEM_PROMPT};

pub const TEST_DIMS: usize = 64;

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket.
///
/// Texts sharing words get high cosine similarity, which is enough to make
/// retrieval order predictable.
pub struct HashEmbedder {
    dims: usize,
    batches: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::with_dims(TEST_DIMS)
    }

    pub fn with_dims(dims: usize) -> Self {
        Self {
            dims,
            batches: AtomicUsize::new(0),
        }
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % self.dims;
            v[bucket] += 1.0;
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in s.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Embedder that succeeds for the first `ok_batches` calls, then fails.
pub struct FlakyEmbedder {
    inner: HashEmbedder,
    ok_batches: usize,
}

impl FlakyEmbedder {
    pub fn new(ok_batches: usize) -> Self {
        Self {
            inner: HashEmbedder::new(),
            ok_batches,
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.inner.batches() >= self.ok_batches {
            return Err(Error::EmbeddingService {
                provider: "test".into(),
                message: "429 Too Many Requests".into(),
            });
        }
        self.inner.embed_batch(texts).await
    }
}

/// Returns a fixed reply and records every prompt it was sent.
pub struct ScriptedGenerator {
    reply: String,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.seen.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

/// Echoes the question on rewrite, and answers with the best-ranked context
/// passage (or "I don't know." when there is none).
pub struct GroundedGenerator;

#[async_trait]
impl Generator for GroundedGenerator {
    fn model_name(&self) -> &str {
        "grounded"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let system = messages.first().map(|m| m.content.as_str()).unwrap_or("");
        let question = messages.last().map(|m| m.content.clone()).unwrap_or_default();

        if system == REWRITE_SYSTEM_PROMPT {
            return Ok(question);
        }

        let context = system
            .strip_prefix(ANSWER_SYSTEM_PROMPT)
            .and_then(|rest| rest.strip_prefix(CONTEXT_SEPARATOR))
            .unwrap_or("");
        match context.split(CONTEXT_SEPARATOR).next().map(str::trim) {
            Some(best) if !best.is_empty() => Ok(best.to_string()),
            _ => Ok("I don't know.".to_string()),
        }
    }
}

pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(Error::GenerationService {
            provider: "test".into(),
            message: "401 Unauthorized".into(),
        })
    }
}

pub fn chunk_with_text(text: &str) -> Chunk {
    Chunk {
        id: uuid::Uuid::new_v4().to_string(),
        document_id: "doc".into(),
        source: "data/test.pdf".into(),
        page: Some(1),
        chunk_index: 0,
        start: 0,
        text: text.to_string(),
        hash: String::new(),
    }
}
