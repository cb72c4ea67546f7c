//! # Intellidoc
//!
//! Retrieval-augmented question answering over uploaded PDF documents.
//!
//! PDFs are split into overlapping chunks, embedded, and stored in a
//! persistent vector index. Questions (optionally with prior conversation
//! turns) are rewritten into standalone form, matched against the index, and
//! answered by a language model using only the retrieved chunks. Every
//! answer carries the chunks it was grounded on as citations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Upload  │──▶│ Extract/Chunk│──▶│   SQLite      │
//! │ PDF file │   │    + Embed   │   │ vector index  │
//! └──────────┘   └──────────────┘   └──────┬───────┘
//!                                          │ top-k
//! ┌──────────┐   ┌──────────────┐   ┌──────▼───────┐
//! │ Question │──▶│   Rewrite    │──▶│   Answer     │──▶ answer + sources
//! │+ history │   │ (standalone) │   │  (grounded)  │
//! └──────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! intellidoc init
//! intellidoc ingest ./report.pdf
//! intellidoc ask "What does the report conclude?"
//! intellidoc serve              # POST /upload/ and /chat/
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Recursive text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Language-model provider abstraction |
//! | [`store`] | Vector index trait and backends |
//! | [`rewriter`] | Standalone-question rewriting |
//! | [`retriever`] | Top-k retrieval |
//! | [`answer`] | Grounded answer generation |
//! | [`engine`] | Ingest and ask orchestration |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod generation;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod retriever;
pub mod rewriter;
pub mod server;
pub mod stats;
pub mod store;

#[cfg(test)]
mod testing;

pub use engine::{EngineSettings, RagEngine};
pub use error::{Error, Result};
