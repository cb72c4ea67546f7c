//! SQLite database connection management.
//!
//! The vector index lives in a single SQLite file inside the configured
//! index directory. WAL mode is enabled so searches keep running while an
//! ingest batch is being committed.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::IndexConfig;
use crate::error::{Error, Result};

/// Create a connection pool to the index database.
///
/// Creates the index directory and database file if they don't exist.
pub async fn connect(config: &IndexConfig) -> Result<SqlitePool> {
    std::fs::create_dir_all(&config.dir).map_err(|e| {
        Error::Index(format!(
            "cannot create index directory {}: {}",
            config.dir.display(),
            e
        ))
    })?;

    let db_path = config.db_path();
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
