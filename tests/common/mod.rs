//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use intellidoc::config::Config;
use intellidoc::embedding::Embedder;
use intellidoc::generation::{ChatMessage, Generator};
use intellidoc::prompt::{ANSWER_SYSTEM_PROMPT, CONTEXT_SEPARATOR, REWRITE_SYSTEM_PROMPT};
use intellidoc::{Error, Result};

pub const DIMS: usize = 64;

/// Config rooted in `root`, with the index and uploads inside it.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.index.dir = root.join("vector_store");
    config.storage.upload_dir = root.join("data");
    config.embedding.dims = DIMS;
    config
}

/// Word-bucket embedder: shared words mean high cosine similarity.
pub struct HashEmbedder {
    dims: usize,
    batches: AtomicUsize,
    fail_after: Option<usize>,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::with_dims(DIMS)
    }

    pub fn with_dims(dims: usize) -> Self {
        Self {
            dims,
            batches: AtomicUsize::new(0),
            fail_after: None,
        }
    }

    /// Succeeds for `ok_batches` batches, then returns a rate-limit error.
    pub fn failing_after(ok_batches: usize) -> Self {
        Self {
            fail_after: Some(ok_batches),
            ..Self::new()
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hash: u64 = 0xcbf29ce484222325;
            for b in word.to_lowercase().bytes() {
                hash ^= b as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[hash as usize % self.dims] += 1.0;
        }
        v
    }
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
        let done = self.batches.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|n| done >= n) {
            return Err(Error::EmbeddingService {
                provider: "test".into(),
                message: "429 Too Many Requests".into(),
            });
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Echoes the question when asked to rewrite; answers with the top-ranked
/// context passage, or "I don't know." when no context was retrieved.
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

/// A two-page PDF with one line of Helvetica text per page.
pub fn two_page_pdf(page1: &str, page2: &str) -> Vec<u8> {
    let content = |text: &str| format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let c1 = content(page1);
    let c2 = content(page2);

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R 5 0 R] /Count 2 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 7 0 R >> >> >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", c1.len(), c1),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 6 0 R /Resources << /Font << /F1 7 0 R >> >> >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", c2.len(), c2),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer << /Size {} /Root 1 0 R >>\nstartxref\n", objects.len() + 1).as_bytes(),
    );
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

pub fn france_pdf() -> Vec<u8> {
    two_page_pdf(
        "The capital of France is Paris.",
        "Bananas are yellow and grow in tropical climates.",
    )
}
