//! SQLite-backed [`VectorIndex`].
//!
//! Each chunk row carries its embedding as a little-endian `f32` BLOB.
//! Every `add` is one transaction: a crash mid-batch loses only that batch
//! and leaves committed rows intact. Writes are serialized through an async
//! mutex; searches run on the pool concurrently and, thanks to WAL, only see
//! committed batches.
//!
//! The `index_meta` table pins the embedding dimensionality the index was
//! built with. Opening the index with a different dimensionality fails with
//! [`Error::Configuration`].

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use crate::config::IndexConfig;
use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{Error, Result};
use crate::migrate;
use crate::models::{Chunk, DocumentRecord, ScoredChunk, UNKNOWN};

use super::{check_batch, rank_top_k, VectorIndex};

pub struct SqliteIndex {
    pool: SqlitePool,
    dims: usize,
    write_lock: Mutex<()>,
}

impl SqliteIndex {
    /// Connect, migrate, and check the pinned embedding dimensionality.
    pub async fn open(config: &IndexConfig, model: &str, dims: usize) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        Self::with_pool(pool, model, dims).await
    }

    /// Wrap an already-migrated pool.
    ///
    /// The first opener pins the embedding model and dimensionality; a
    /// concurrent opener racing on a fresh index sees whichever pair won.
    pub async fn with_pool(pool: SqlitePool, model: &str, dims: usize) -> Result<Self> {
        sqlx::query(
            "INSERT OR IGNORE INTO index_meta (key, value) VALUES ('embedding_model', ?), ('dims', ?)",
        )
        .bind(model)
        .bind(dims.to_string())
        .execute(&pool)
        .await?;

        let (stored_model, stored_dims) = read_meta(&pool)
            .await?
            .ok_or_else(|| Error::Index("index_meta has no dims entry".to_string()))?;
        if stored_dims != dims {
            return Err(Error::Configuration(format!(
                "embedding dimension mismatch: index was built with {} dimensions ({}), \
                 configured embedder produces {} ({})",
                stored_dims, stored_model, dims, model
            )));
        }
        if stored_model != model {
            tracing::warn!(
                stored = %stored_model,
                configured = %model,
                "index was built with a different embedding model"
            );
        }

        Ok(Self {
            pool,
            dims,
            write_lock: Mutex::new(()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Read the `(embedding_model, dims)` pinned in `index_meta`, if any.
pub async fn read_meta(pool: &SqlitePool) -> Result<Option<(String, usize)>> {
    let rows = sqlx::query("SELECT key, value FROM index_meta")
        .fetch_all(pool)
        .await?;

    let mut model = None;
    let mut dims = None;
    for row in &rows {
        let key: String = row.get("key");
        let value: String = row.get("value");
        match key.as_str() {
            "embedding_model" => model = Some(value),
            "dims" => {
                dims = Some(value.parse::<usize>().map_err(|e| {
                    Error::Index(format!("corrupt index_meta dims '{}': {}", value, e))
                })?)
            }
            _ => {}
        }
    }

    Ok(dims.map(|d| (model.unwrap_or_else(|| UNKNOWN.to_string()), d)))
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn register_document(&self, record: &DocumentRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            r#"
            INSERT INTO documents (id, source, content_hash, page_count, chunk_count, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.source)
        .bind(&record.content_hash)
        .bind(record.page_count)
        .bind(record.chunk_count)
        .bind(record.ingested_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        check_batch(chunks, embeddings, self.dims)?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(embeddings) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, source, page, chunk_index,
                                    start_offset, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&chunk.source)
            .bind(chunk.page.map(i64::from))
            .bind(chunk.chunk_index)
            .bind(chunk.start as i64)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(chunks.len())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, document_id, source, page, chunk_index, start_offset, text, hash, embedding
            FROM chunks
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let entries = rows.iter().map(|row| {
            let source: Option<String> = row.get("source");
            let page: Option<i64> = row.get("page");
            let start: i64 = row.get("start_offset");
            let blob: Vec<u8> = row.get("embedding");
            let chunk = Chunk {
                id: row.get("id"),
                document_id: row.get("document_id"),
                source: source
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                page: page.and_then(|p| u32::try_from(p).ok()),
                chunk_index: row.get("chunk_index"),
                start: start.max(0) as usize,
                text: row.get("text"),
                hash: row.get("hash"),
            };
            (chunk, blob_to_vec(&blob))
        });

        Ok(rank_top_k(query, entries, k))
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn document_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::chunk_with_text;

    async fn open(dir: &std::path::Path, dims: usize) -> Result<SqliteIndex> {
        let config = IndexConfig {
            dir: dir.join("vector_store"),
        };
        SqliteIndex::open(&config, "test-model", dims).await
    }

    #[tokio::test]
    async fn test_empty_index_search() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open(tmp.path(), 2).await.unwrap();
        assert!(index.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
        assert!(index.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_meta_pinned_on_first_open() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open(tmp.path(), 3).await.unwrap();
        let meta = read_meta(index.pool()).await.unwrap();
        assert_eq!(meta, Some(("test-model".to_string(), 3)));
        index.close().await;

        let err = open(tmp.path(), 4).await.err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_first_opens_agree() {
        for _ in 0..10 {
            let tmp = tempfile::TempDir::new().unwrap();
            let (a, b) = tokio::join!(open(tmp.path(), 3), open(tmp.path(), 3));
            let (a, b) = (a.unwrap(), b.unwrap());
            assert_eq!(
                read_meta(b.pool()).await.unwrap(),
                Some(("test-model".to_string(), 3))
            );
            a.close().await;
            b.close().await;
        }
    }

    #[tokio::test]
    async fn test_first_open_wins_dims() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (a, b) = tokio::join!(open(tmp.path(), 3), open(tmp.path(), 4));
        // exactly one of the two pins the index, the other is refused
        assert!(a.is_ok() != b.is_ok());
        let err = a.err().or(b.err()).unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_ties_in_insertion_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open(tmp.path(), 2).await.unwrap();

        let chunks = vec![
            chunk_with_text("first"),
            chunk_with_text("second"),
            chunk_with_text("other"),
        ];
        let vectors = vec![vec![1.0, 0.0], vec![2.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(index.add(&chunks, &vectors).await.unwrap(), 3);

        let hits = index.search(&[1.0, 0.0], 2).await.unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(hits[0].chunk.page, Some(1));
    }

    #[tokio::test]
    async fn test_rejected_batch_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open(tmp.path(), 2).await.unwrap();

        let chunks = vec![chunk_with_text("a"), chunk_with_text("b")];
        let vectors = vec![vec![1.0, 0.0], vec![1.0]];
        assert!(index.add(&chunks, &vectors).await.is_err());
        assert_eq!(index.len().await.unwrap(), 0);
    }
}
