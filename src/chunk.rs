//! Recursive character text chunker.
//!
//! Splits each page of a [`Document`] into [`Chunk`]s of at most
//! `chunk_size` characters, with consecutive chunks sharing up to
//! `chunk_overlap` characters. Chunks never span pages, so every chunk
//! carries the exact page it came from.
//!
//! # Algorithm
//!
//! 1. Cut the page into *pieces*: if a segment is longer than `chunk_size`,
//!    split it on the first separator it contains (`"\n\n"`, `"\n"`, `". "`,
//!    `" "`), keeping the separator attached to the preceding piece, and
//!    recurse with the remaining separators. With no separator left, fall
//!    back to single characters.
//! 2. Merge consecutive pieces greedily while the total stays within
//!    `chunk_size`.
//! 3. Start the next chunk with the trailing pieces of the previous one,
//!    as long as they total at most `chunk_overlap` characters.
//!
//! Pieces are exact slices of the page text, so chunks are too: the page is
//! reconstructible from its chunks by dropping each chunk's overlap prefix.
//! Windows holding only whitespace are not emitted, so the one thing that
//! can fall between two consecutive chunks is a whitespace run.
//!
//! # Example
//!
//! ```rust
//! use intellidoc::chunk::Chunker;
//! use intellidoc::models::{Document, Page};
//!
//! let doc = Document::new("a.pdf", vec![Page { number: 1, text: "Hello world.".into() }]);
//! let chunks = Chunker::new(1000, 100).split("doc-1", &doc);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].page, Some(1));
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, Document};

/// Boundaries tried in order before a hard character cut.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// Byte range of a chunk within the text it was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

/// Splits documents into overlapping, page-attributed chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// `chunk_size` and `chunk_overlap` are in characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split every page of `document` into chunks.
    ///
    /// Chunk indices are contiguous across the whole document, starting at 0.
    /// Blank pages contribute no chunks.
    pub fn split(&self, document_id: &str, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut chunk_index: i64 = 0;

        for page in &document.pages {
            for span in self.split_text(&page.text) {
                let text = &page.text[span.start..span.end];
                if text.trim().is_empty() {
                    continue;
                }
                chunks.push(make_chunk(
                    document_id,
                    &document.source,
                    Some(page.number),
                    chunk_index,
                    span.start,
                    text,
                ));
                chunk_index += 1;
            }
        }

        chunks
    }

    /// Compute chunk spans for a single text.
    pub fn split_text(&self, text: &str) -> Vec<Span> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut pieces = Vec::new();
        split_recursive(text, 0, self.chunk_size, SEPARATORS, &mut pieces);
        merge_pieces(&pieces, self.chunk_size, self.chunk_overlap)
    }
}

fn split_recursive(
    text: &str,
    base: usize,
    max_chars: usize,
    separators: &[&str],
    out: &mut Vec<Piece>,
) {
    let chars = text.chars().count();
    if chars <= max_chars {
        if chars > 0 {
            out.push(Piece {
                start: base,
                end: base + text.len(),
                chars,
            });
        }
        return;
    }

    let Some(pos) = separators.iter().position(|sep| text.contains(sep)) else {
        for (i, c) in text.char_indices() {
            out.push(Piece {
                start: base + i,
                end: base + i + c.len_utf8(),
                chars: 1,
            });
        }
        return;
    };

    let separator = separators[pos];
    let remaining = &separators[pos + 1..];
    let mut offset = 0;
    for part in text.split_inclusive(separator) {
        split_recursive(part, base + offset, max_chars, remaining, out);
        offset += part.len();
    }
}

fn merge_pieces(pieces: &[Piece], chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut window: VecDeque<Piece> = VecDeque::new();
    let mut window_chars = 0usize;

    for piece in pieces {
        if !window.is_empty() && window_chars + piece.chars > chunk_size {
            spans.push(window_span(&window));
            while let Some(front) = window.front() {
                if window_chars > chunk_overlap || window_chars + piece.chars > chunk_size {
                    window_chars -= front.chars;
                    window.pop_front();
                } else {
                    break;
                }
            }
        }
        window_chars += piece.chars;
        window.push_back(*piece);
    }

    if !window.is_empty() {
        spans.push(window_span(&window));
    }

    spans
}

fn window_span(window: &VecDeque<Piece>) -> Span {
    Span {
        start: window.front().map(|p| p.start).unwrap_or(0),
        end: window.back().map(|p| p.end).unwrap_or(0),
    }
}

/// Create a single [`Chunk`] with a UUID and SHA-256 content hash.
fn make_chunk(
    document_id: &str,
    source: &str,
    page: Option<u32>,
    index: i64,
    start: usize,
    text: &str,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        source: source.to_string(),
        page,
        chunk_index: index,
        start,
        text: text.to_string(),
        hash,
    }
}
