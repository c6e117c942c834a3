//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the full ingest-and-answer workflow by
//! composing an [`EmbeddingProvider`], a [`VectorStore`] and a
//! [`CompletionProvider`].
//!
//! # Example
//!
//! ```rust,ignore
//! use brain_rag::{Document, InMemoryVectorStore, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .completion_provider(Arc::new(my_llm))
//!     .build()?;
//!
//! let report = pipeline.ingest(&Document::new("notes.txt", bytes)).await?;
//! let answer = pipeline.query("What is in my notes?").await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::chunking::SlidingWindowChunker;
use crate::completion::{ChatMessage, CompletionProvider};
use crate::config::RagConfig;
use crate::document::{
    Answer, Chunk, CollectionSchema, Document, Hit, IngestReport, Point, PointPayload, content_id,
    point_id,
};
use crate::embedding::{EmbeddingProvider, validate_batch};
use crate::error::{RagError, Result};
use crate::extract::extract_text;
use crate::vectorstore::VectorStore;

/// Join hit texts in ranked order, separated by one blank line.
pub fn build_context(hits: &[Hit]) -> String {
    hits.iter().map(|h| h.payload.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

/// The user turn sent to the completion provider.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {question}")
}

/// The RAG pipeline orchestrator.
///
/// Coordinates document ingestion (extract → chunk → embed → store) and
/// question answering (embed → search → filter → complete). Construct one
/// via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    chunker: SlidingWindowChunker,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    completion_provider: Arc<dyn CompletionProvider>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Ingest an uploaded document: extract → chunk → embed → store.
    ///
    /// Re-ingesting the same bytes overwrites the points written the first
    /// time, because point ids derive from the content hash.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] or [`RagError::Decode`] for unreadable
    /// input, provider errors from embedding, and store errors from upsert.
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport> {
        let text = extract_text(document).await.map_err(|e| {
            warn!(
                source = %document.filename,
                format = %document.format,
                error = %e,
                "text extraction failed"
            );
            e
        })?;
        debug!(
            source = %document.filename,
            format = %document.format,
            chars = text.chars().count(),
            "extracted document text"
        );
        self.ingest_extracted(&document.filename, document.id(), &text).await
    }

    /// Ingest text the caller has already extracted.
    ///
    /// The document id is the hash of the UTF-8 text.
    pub async fn ingest_text(&self, source: &str, text: &str) -> Result<IngestReport> {
        self.ingest_extracted(source, content_id(text.as_bytes()), text).await
    }

    async fn ingest_extracted(
        &self,
        source: &str,
        document_id: String,
        text: &str,
    ) -> Result<IngestReport> {
        // 1. Chunk
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            info!(document.id = %document_id, source, chunk_count = 0, "ingested document (empty)");
            return Ok(IngestReport { document_id, chunks: 0 });
        }

        // 2. Embed every chunk in one batch
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(document.id = %document_id, error = %e, "embedding failed during ingestion");
            e
        })?;
        let dimensions = validate_batch(self.embedding_provider.name(), texts.len(), &embeddings)?;

        // 3. Bind the collection to the provider's dimensionality
        let collection = self.config.collection.as_str();
        self.vector_store
            .ensure_collection(collection, CollectionSchema::cosine(dimensions))
            .await
            .map_err(|e| {
                error!(collection, error = %e, "failed to prepare collection");
                e
            })?;

        // 4. Upsert
        let points = Self::to_points(&document_id, source, chunks, embeddings);
        self.upsert_all(&document_id, &points).await?;

        let chunk_count = points.len();
        info!(document.id = %document_id, source, collection, chunk_count, "ingested document");

        Ok(IngestReport { document_id, chunks: chunk_count })
    }

    fn to_points(
        document_id: &str,
        source: &str,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Vec<Point> {
        chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| Point {
                id: point_id(document_id, chunk.index),
                vector,
                payload: PointPayload {
                    text: chunk.text,
                    document_id: document_id.to_string(),
                    chunk_index: chunk.index,
                    source: source.to_string(),
                },
            })
            .collect()
    }

    /// Upsert in batches. If a batch fails, points created by this call are
    /// deleted again; points that were stored beforehand stay.
    async fn upsert_all(&self, document_id: &str, points: &[Point]) -> Result<()> {
        let collection = self.config.collection.as_str();

        let ids: Vec<&str> = points.iter().map(|p| p.id.as_str()).collect();
        let existing: HashSet<String> = self
            .vector_store
            .existing_ids(collection, &ids)
            .await
            .map_err(|e| {
                error!(
                    document.id = %document_id,
                    collection,
                    error = %e,
                    "failed to read existing points"
                );
                e
            })?
            .into_iter()
            .collect();

        let mut written = 0;
        for batch in points.chunks(self.config.upsert_batch_size.max(1)) {
            if let Err(e) = self.vector_store.upsert(collection, batch).await {
                error!(
                    document.id = %document_id,
                    collection,
                    written,
                    error = %e,
                    "upsert failed during ingestion"
                );
                self.compensate(document_id, &points[..written], &existing).await;
                return Err(e);
            }
            written += batch.len();
        }
        Ok(())
    }

    /// Best effort: a failure here is logged and the caller's error wins.
    async fn compensate(&self, document_id: &str, written: &[Point], existing: &HashSet<String>) {
        let ids: Vec<&str> =
            written.iter().map(|p| p.id.as_str()).filter(|id| !existing.contains(*id)).collect();
        let kept = written.len() - ids.len();
        if ids.is_empty() {
            if kept > 0 {
                debug!(document.id = %document_id, kept, "nothing to roll back");
            }
            return;
        }

        match self.vector_store.delete(&self.config.collection, &ids).await {
            Ok(()) => warn!(
                document.id = %document_id,
                removed = ids.len(),
                kept,
                "rolled back partial ingestion"
            ),
            Err(e) => warn!(
                document.id = %document_id,
                orphaned = ids.len(),
                error = %e,
                "failed to roll back partial ingestion"
            ),
        }
    }

    /// Embed `question` and return the matching hits, best first.
    ///
    /// Hits scoring below the configured `similarity_threshold` are dropped.
    /// An empty result is not an error here.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<Hit>> {
        let query_embedding = self.embedding_provider.embed(question).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        let collection = self.config.collection.as_str();
        let hits =
            self.vector_store.search(collection, &query_embedding, self.config.top_k).await.map_err(
                |e| {
                    error!(collection, error = %e, "vector store search failed");
                    e
                },
            )?;

        let hits: Vec<Hit> = match self.config.similarity_threshold {
            Some(threshold) => hits.into_iter().filter(|h| h.score >= threshold).collect(),
            None => hits,
        };

        debug!(collection, hit_count = hits.len(), "retrieved context");
        Ok(hits)
    }

    /// Answer `question` from the stored context.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NoContextFound`] when retrieval yields nothing,
    /// without calling the completion provider.
    pub async fn query(&self, question: &str) -> Result<Answer> {
        let hits = self.retrieve(question).await?;
        if hits.is_empty() {
            info!(collection = %self.config.collection, "no relevant context found");
            return Err(RagError::NoContextFound);
        }

        let context = build_context(&hits);
        let messages = [
            ChatMessage::system(self.config.system_prompt.clone()),
            ChatMessage::user(build_prompt(&context, question)),
        ];

        let answer = self.completion_provider.complete(&messages).await.map_err(|e| {
            error!(provider = self.completion_provider.name(), error = %e, "completion failed");
            e
        })?;

        info!(
            hit_count = hits.len(),
            top_score = hits[0].score,
            answer_chars = answer.chars().count(),
            "query completed"
        );

        Ok(Answer { answer, hits })
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// All three collaborators are required; the config defaults to
/// [`RagConfig::default()`]. Call [`build()`](RagPipelineBuilder::build) to
/// validate and produce the pipeline.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    completion_provider: Option<Arc<dyn CompletionProvider>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the completion provider.
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion_provider = Some(provider);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a collaborator is missing, or
    /// [`RagError::InvalidChunkConfig`] if the chunk settings are unusable.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let chunker = SlidingWindowChunker::new(config.chunk_size, config.chunk_overlap)?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let completion_provider = self
            .completion_provider
            .ok_or_else(|| RagError::Config("completion_provider is required".to_string()))?;

        Ok(RagPipeline { config, chunker, embedding_provider, vector_store, completion_provider })
    }
}
