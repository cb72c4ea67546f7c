//! Core data models used throughout Intellidoc.
//!
//! These types represent the documents, chunks, conversation turns, and
//! answers that flow through the ingestion and question-answering pipeline.

use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Sentinel used when a chunk carries no source or page metadata.
pub const UNKNOWN: &str = "unknown";

/// One page of extracted document text. Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

/// A source document, split into ordered pages.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path or identifier of the stored upload.
    pub source: String,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(source: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            source: source.into(),
            pages,
        }
    }

    /// SHA-256 over all page texts, used to spot re-ingested files in stats.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for page in &self.pages {
            hasher.update(page.number.to_le_bytes());
            hasher.update(page.text.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Bookkeeping row written once per ingest call.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub source: String,
    pub content_hash: String,
    pub page_count: i64,
    pub chunk_count: i64,
    pub ingested_at: i64,
}

/// A chunk of one page's text, the unit of retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub source: String,
    pub page: Option<u32>,
    /// Position within the document, contiguous from 0.
    pub chunk_index: i64,
    /// Byte offset of `text` inside the page text.
    pub start: usize,
    pub text: String,
    /// SHA-256 hex digest of `text`.
    pub hash: String,
}

/// A chunk paired with its similarity to the query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Parses the wire form; anything other than `user`/`assistant` is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of caller-supplied history. Never stored server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A citation pointing at the chunk an answer was conditioned on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    pub source: String,
    #[serde(serialize_with = "serialize_page")]
    pub page: Option<u32>,
    pub content: String,
}

impl From<&Chunk> for SourceCitation {
    fn from(chunk: &Chunk) -> Self {
        let source = if chunk.source.is_empty() {
            UNKNOWN.to_string()
        } else {
            chunk.source.clone()
        };
        Self {
            source,
            page: chunk.page,
            content: chunk.text.clone(),
        }
    }
}

fn serialize_page<S: Serializer>(page: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
    match page {
        Some(n) => s.serialize_u32(*n),
        None => s.serialize_str(UNKNOWN),
    }
}

/// Answer plus the sources it was grounded on, in retrieval order.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
}
