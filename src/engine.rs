//! Ingestion and question-answering orchestration.
//!
//! [`RagEngine`] owns one vector index, one embedder and one generator, and
//! is shared behind an `Arc` by every request handler.
//!
//! # Ingest
//!
//! ```text
//! PDF bytes ─▶ extract pages ─▶ chunk ─▶ embed (batch) ─▶ index.add (batch)
//! ```
//!
//! Each batch is committed before the next is embedded, so a failure part
//! way through leaves the earlier batches searchable.
//!
//! # Ask
//!
//! ```text
//! question + history ─▶ rewrite ─▶ embed ─▶ top-k search ─▶ answer
//! ```
//!
//! The rewritten question is only used for retrieval; the answer call sees
//! the original question and history. Sources are the retrieved chunks in
//! retrieval order, whatever the model says.

use std::path::Path;
use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::answer::AnswerGenerator;
use crate::chunk::Chunker;
use crate::config::{Config, API_KEY_ENV};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::extract::extract_pages;
use crate::generation::{create_generator, Generator};
use crate::models::{
    Chunk, ConversationTurn, Document, DocumentRecord, QueryResult, SourceCitation,
};
use crate::retriever::Retriever;
use crate::rewriter::QueryRewriter;
use crate::store::{SqliteIndex, VectorIndex};

/// Tunables the engine reads once at construction.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub batch_size: usize,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            top_k: config.retrieval.top_k,
            batch_size: config.embedding.batch_size,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct RagEngine {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    rewriter: QueryRewriter,
    retriever: Retriever,
    answerer: AnswerGenerator,
    batch_size: usize,
    pool: Option<SqlitePool>,
}

impl RagEngine {
    /// Build the engine described by `config`: backends from the configured
    /// providers, index from the configured directory.
    ///
    /// The API key is read from `OPENAI_API_KEY`.
    pub async fn open(config: &Config) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).ok();
        let embedder = create_embedder(&config.embedding, api_key.as_deref())?;
        let generator = create_generator(&config.llm, api_key.as_deref())?;
        Self::open_with(config, embedder, generator).await
    }

    /// Like [`open`](Self::open), with caller-supplied backends.
    pub async fn open_with(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let index = SqliteIndex::open(&config.index, embedder.model_name(), embedder.dims()).await?;
        let pool = index.pool().clone();
        let mut engine = Self::new(
            Arc::new(index),
            embedder,
            generator,
            EngineSettings::from_config(config),
        )?;
        engine.pool = Some(pool);
        info!(
            index = %config.index.db_path().display(),
            embedding_model = %engine.embedder.model_name(),
            "engine ready"
        );
        Ok(engine)
    }

    /// Assemble an engine from parts.
    ///
    /// Fails with [`Error::Configuration`] if the embedder and index disagree
    /// on dimensionality.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        settings: EngineSettings,
    ) -> Result<Self> {
        if index.dims() != embedder.dims() {
            return Err(Error::Configuration(format!(
                "embedding dimension mismatch: index expects {}, embedder {} produces {}",
                index.dims(),
                embedder.model_name(),
                embedder.dims()
            )));
        }

        Ok(Self {
            chunker: Chunker::new(settings.chunk_size, settings.chunk_overlap),
            rewriter: QueryRewriter::new(generator.clone()),
            retriever: Retriever::new(index.clone(), embedder.clone(), settings.top_k),
            answerer: AnswerGenerator::new(generator),
            batch_size: settings.batch_size.max(1),
            index,
            embedder,
            pool: None,
        })
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Read, extract, chunk, embed and index the PDF at `path`.
    ///
    /// The path is recorded as every chunk's source. Returns the number of
    /// chunks added.
    pub async fn ingest_file(&self, path: &Path) -> Result<usize> {
        let source = path.display().to_string();

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::ingest(&source, Error::Document(format!("cannot read file: {}", e))))?;

        let pages = tokio::task::spawn_blocking(move || extract_pages(&bytes))
            .await
            .map_err(|e| Error::ingest(&source, Error::Document(format!("extraction task failed: {}", e))))?
            .map_err(|e| Error::ingest(&source, e))?;

        self.ingest_document(&Document::new(source, pages)).await
    }

    /// Chunk, embed and index already-extracted pages.
    pub async fn ingest_document(&self, document: &Document) -> Result<usize> {
        self.ingest_chunks(document)
            .await
            .map_err(|e| Error::ingest(&document.source, e))
    }

    async fn ingest_chunks(&self, document: &Document) -> Result<usize> {
        let document_id = Uuid::new_v4().to_string();
        let chunks = self.chunker.split(&document_id, document);

        self.index
            .register_document(&DocumentRecord {
                id: document_id.clone(),
                source: document.source.clone(),
                content_hash: document.content_hash(),
                page_count: document.pages.len() as i64,
                chunk_count: chunks.len() as i64,
                ingested_at: chrono::Utc::now().timestamp(),
            })
            .await?;

        if chunks.is_empty() {
            warn!(source = %document.source, "document has no extractable text");
            return Ok(0);
        }

        let mut added = 0;
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            added += self.index.add(batch, &vectors).await?;
            debug!(source = %document.source, added, total = chunks.len(), "committed batch");
        }

        info!(
            source = %document.source,
            pages = document.pages.len(),
            chunks = added,
            "document ingested"
        );
        Ok(added)
    }

    /// Answer `question` from the indexed documents, using `history` to
    /// resolve follow-ups.
    pub async fn ask(&self, question: &str, history: &[ConversationTurn]) -> Result<QueryResult> {
        self.answer(question, history).await.map_err(Error::query)
    }

    async fn answer(&self, question: &str, history: &[ConversationTurn]) -> Result<QueryResult> {
        let standalone = self.rewriter.rewrite(history, question).await?;
        let retrieved = self.retriever.retrieve(&standalone).await?;
        let chunks: Vec<Chunk> = retrieved.into_iter().map(|s| s.chunk).collect();

        let answer = self.answerer.generate(question, history, &chunks).await?;
        let sources = chunks.iter().map(SourceCitation::from).collect();

        Ok(QueryResult { answer, sources })
    }

    /// Close the index's database pool, if the engine owns one.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Page;
    use crate::store::InMemoryIndex;
    use crate::testing::{
        FailingGenerator, FlakyEmbedder, GroundedGenerator, HashEmbedder, ScriptedGenerator,
        TEST_DIMS,
    };

    fn settings() -> EngineSettings {
        EngineSettings {
            chunk_size: 200,
            chunk_overlap: 20,
            top_k: 5,
            batch_size: 2,
        }
    }

    fn engine_with(generator: Arc<dyn Generator>) -> RagEngine {
        RagEngine::new(
            Arc::new(InMemoryIndex::new(TEST_DIMS)),
            Arc::new(HashEmbedder::new()),
            generator,
            settings(),
        )
        .unwrap()
    }

    fn two_page_document() -> Document {
        Document::new(
            "data/france.pdf",
            vec![
                Page {
                    number: 1,
                    text: "The capital of France is Paris.".into(),
                },
                Page {
                    number: 2,
                    text: "Bananas are yellow and grow in tropical climates.".into(),
                },
            ],
        )
    }

    #[tokio::test]
    async fn test_ingest_then_ask_cites_page() {
        let engine = engine_with(Arc::new(GroundedGenerator));
        let added = engine.ingest_document(&two_page_document()).await.unwrap();
        assert_eq!(added, 2);

        let result = engine.ask("What is the capital of France?", &[]).await.unwrap();
        assert!(result.answer.contains("Paris"));
        assert_eq!(result.sources[0].page, Some(1));
        assert_eq!(result.sources[0].source, "data/france.pdf");
        assert!(result.sources.len() <= 5);
    }

    #[tokio::test]
    async fn test_ask_empty_index() {
        let engine = engine_with(Arc::new(GroundedGenerator));
        let result = engine.ask("What is the capital of France?", &[]).await.unwrap();
        assert!(result.sources.is_empty());
        assert!(result.answer.contains("don't know"));
    }

    #[tokio::test]
    async fn test_duplicate_ingest_doubles_chunks() {
        let engine = engine_with(Arc::new(GroundedGenerator));
        engine.ingest_document(&two_page_document()).await.unwrap();
        engine.ingest_document(&two_page_document()).await.unwrap();
        assert_eq!(engine.index().len().await.unwrap(), 4);
        assert_eq!(engine.index().document_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_blank_document_adds_nothing() {
        let engine = engine_with(Arc::new(GroundedGenerator));
        let doc = Document::new(
            "scan.pdf",
            vec![Page {
                number: 1,
                text: "   ".into(),
            }],
        );
        assert_eq!(engine.ingest_document(&doc).await.unwrap(), 0);
        assert!(engine.index().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_partial_ingest_keeps_committed_batches() {
        let index = Arc::new(InMemoryIndex::new(TEST_DIMS));
        let engine = RagEngine::new(
            index.clone(),
            Arc::new(FlakyEmbedder::new(1)),
            Arc::new(GroundedGenerator),
            EngineSettings {
                batch_size: 1,
                ..settings()
            },
        )
        .unwrap();

        let err = engine.ingest_document(&two_page_document()).await.unwrap_err();
        match &err {
            Error::Ingest { path, inner } => {
                assert_eq!(path, "data/france.pdf");
                assert!(matches!(**inner, Error::EmbeddingService { .. }));
            }
            other => panic!("expected ingest error, got {:?}", other),
        }
        assert_eq!(index.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_is_query_error() {
        let engine = engine_with(Arc::new(FailingGenerator));
        engine.ingest_document(&two_page_document()).await.unwrap();
        let err = engine.ask("anything", &[]).await.unwrap_err();
        match err {
            Error::Query(inner) => assert!(matches!(*inner, Error::GenerationService { .. })),
            other => panic!("expected query error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_history_uses_rewrite_then_answer() {
        let generator = Arc::new(ScriptedGenerator::new("Paris."));
        let engine = engine_with(generator.clone());
        engine.ingest_document(&two_page_document()).await.unwrap();

        let history = vec![
            ConversationTurn::user("Tell me about France."),
            ConversationTurn::assistant("It is a country in Europe."),
        ];
        let result = engine.ask("What is its capital?", &history).await.unwrap();
        assert_eq!(result.answer, "Paris.");
        // one rewrite call, one answer call
        assert_eq!(generator.calls(), 2);
        let last = generator.last_messages();
        assert_eq!(last.len(), 4);
        assert_eq!(last[3].content, "What is its capital?");
    }

    #[tokio::test]
    async fn test_dims_mismatch_rejected() {
        let result = RagEngine::new(
            Arc::new(InMemoryIndex::new(8)),
            Arc::new(HashEmbedder::with_dims(16)),
            Arc::new(GroundedGenerator),
            settings(),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
