//! Index statistics.
//!
//! Summarizes what's been ingested: documents, chunks, the embedding model
//! the index is pinned to, and a per-source breakdown. Used by
//! `intellidoc stats`. Reads the database directly, so it needs no API key.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::store::sqlite::read_meta;

/// Counts for one source path.
#[derive(Debug, Clone)]
pub struct SourceStats {
    pub source: String,
    pub ingests: i64,
    pub chunk_count: i64,
    pub last_ingested_at: i64,
}

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub documents: i64,
    pub chunks: i64,
    /// Distinct document contents; lower than `documents` when a file was
    /// ingested more than once.
    pub unique_contents: i64,
    pub embedding_model: Option<String>,
    pub dims: Option<usize>,
    pub sources: Vec<SourceStats>,
}

/// Query the index database for its summary.
pub async fn collect_stats(pool: &SqlitePool) -> Result<IndexStats> {
    let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;

    let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;

    let unique_contents: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT content_hash) FROM documents")
            .fetch_one(pool)
            .await?;

    let meta = read_meta(pool).await?;

    let rows = sqlx::query(
        r#"
        SELECT
            d.source,
            COUNT(DISTINCT d.id) AS ingests,
            COUNT(c.id) AS chunk_count,
            MAX(d.ingested_at) AS last_ingested_at
        FROM documents d
        LEFT JOIN chunks c ON c.document_id = d.id
        GROUP BY d.source
        ORDER BY chunk_count DESC, d.source
        "#,
    )
    .fetch_all(pool)
    .await?;

    let sources = rows
        .iter()
        .map(|row| SourceStats {
            source: row.get("source"),
            ingests: row.get("ingests"),
            chunk_count: row.get("chunk_count"),
            last_ingested_at: row.get("last_ingested_at"),
        })
        .collect();

    let (embedding_model, dims) = match meta {
        Some((model, dims)) => (Some(model), Some(dims)),
        None => (None, None),
    };

    Ok(IndexStats {
        documents,
        chunks,
        unique_contents,
        embedding_model,
        dims,
        sources,
    })
}

/// Run the stats command: query the index and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(&config.index).await?;
    migrate::run_migrations(&pool).await?;
    let stats = collect_stats(&pool).await?;
    pool.close().await;

    let db_path = config.index.db_path();
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("Intellidoc Index Stats");
    println!("======================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    match (&stats.embedding_model, stats.dims) {
        (Some(model), Some(dims)) => println!("  Embeddings:  {} ({} dims)", model, dims),
        _ => println!("  Embeddings:  (not yet pinned)"),
    }
    println!();
    println!(
        "  Documents:   {} ({} unique)",
        stats.documents, stats.unique_contents
    );
    println!("  Chunks:      {}", stats.chunks);

    if !stats.sources.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<40} {:>7} {:>8}   {}",
            "SOURCE", "INGESTS", "CHUNKS", "LAST INGEST"
        );
        println!("  {}", "-".repeat(76));

        for s in &stats.sources {
            println!(
                "  {:<40} {:>7} {:>8}   {}",
                s.source,
                s.ingests,
                s.chunk_count,
                format_ts_relative(s.last_ingested_at)
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
