//! CLI command implementations for `init`, `ingest`, and `ask`.
//!
//! Results go to stdout; progress and diagnostics go through `tracing`.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::engine::RagEngine;
use crate::extract::is_supported_upload;
use crate::migrate;
use crate::models::{ConversationTurn, QueryResult};

/// Longest source excerpt printed by `ask`, in characters.
const EXCERPT_CHARS: usize = 160;

/// Create the storage directories and the index schema. Idempotent.
pub async fn run_init(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.storage.upload_dir).with_context(|| {
        format!(
            "Failed to create upload directory: {}",
            config.storage.upload_dir.display()
        )
    })?;

    let pool = db::connect(&config.index).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;

    println!(
        "Index initialized at {}",
        config.index.db_path().display()
    );
    Ok(())
}

/// Ingest a local PDF into the index.
pub async fn run_ingest(config: &Config, file: &Path) -> Result<()> {
    let name = file.display().to_string();
    if !is_supported_upload(&name) {
        anyhow::bail!("Only PDF files are supported: {}", name);
    }
    if !file.is_file() {
        anyhow::bail!("File not found: {}", name);
    }

    let engine = RagEngine::open(config).await?;
    let result = engine.ingest_file(file).await;
    engine.close().await;

    let chunks = result?;
    println!("Ingested {} ({} chunks)", name, chunks);
    Ok(())
}

/// Ask a question, optionally continuing a conversation read from a JSON
/// file of `{"role", "content"}` turns.
pub async fn run_ask(config: &Config, question: &str, history: Option<&Path>) -> Result<()> {
    let history = match history {
        Some(path) => load_history(path)?,
        None => Vec::new(),
    };

    let engine = RagEngine::open(config).await?;
    let result = engine.ask(question, &history).await;
    engine.close().await;

    print_result(&result?);
    Ok(())
}

fn load_history(path: &Path) -> Result<Vec<ConversationTurn>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse history file: {}", path.display()))
}

fn print_result(result: &QueryResult) {
    println!("{}", result.answer);

    if result.sources.is_empty() {
        return;
    }

    println!();
    println!("Sources:");
    for (i, source) in result.sources.iter().enumerate() {
        let page = source
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| crate::models::UNKNOWN.to_string());
        println!("  [{}] {} (page {})", i + 1, source.source, page);
        println!("      {}", excerpt(&source.content));
    }
}

fn excerpt(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}
