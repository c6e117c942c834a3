//! # brain-rag
//!
//! Document ingestion and retrieval pipeline for The Brain.
//!
//! ## Overview
//!
//! Uploaded documents are turned into text, split into overlapping chunks,
//! embedded, and stored as points in a vector collection. Questions are
//! embedded the same way, matched against the collection, and the best
//! chunks are forwarded as context to a chat-completion model.
//!
//! - [`extract`] - plain text, PDF and DOCX text extraction
//! - [`SlidingWindowChunker`] - character-based sliding window chunking
//! - [`EmbeddingProvider`] / [`CompletionProvider`] - model backends
//! - [`VectorStore`] - collection management and similarity search
//! - [`RagPipeline`] - the orchestrator tying them together
//!
//! ## Features
//!
//! - `openai` (default): OpenAI-compatible embedding and completion clients
//!   (works against Ollama, vLLM and similar servers)
//! - `qdrant` (default): Qdrant vector store over gRPC
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use brain_rag::{Document, InMemoryVectorStore, RagConfig, RagPipeline};
//! use brain_rag::openai::{OpenAICompletionProvider, OpenAIEmbeddingProvider};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::new(
//!         "http://127.0.0.1:11434/v1",
//!         "llama2",
//!     )?))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .completion_provider(Arc::new(OpenAICompletionProvider::new(
//!         "http://127.0.0.1:11434/v1",
//!         "llama2",
//!     )?))
//!     .build()?;
//!
//! pipeline.ingest(&Document::new("notes.txt", std::fs::read("notes.txt")?)).await?;
//! let answer = pipeline.query("What did I write down?").await?;
//! println!("{}", answer.answer);
//! ```

pub mod chunking;
pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod inmemory;
pub mod pipeline;
pub mod retry;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{SlidingWindowChunker, chunk_text};
pub use completion::{ChatMessage, ChatRole, CompletionProvider};
pub use config::{DEFAULT_COLLECTION, DEFAULT_SYSTEM_PROMPT, RagConfig, RagConfigBuilder};
pub use document::{
    Answer, Chunk, CollectionSchema, DistanceMetric, Document, DocumentFormat, Hit, IngestReport,
    Point, PointPayload,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extract::extract_text;
pub use inmemory::InMemoryVectorStore;
pub use pipeline::{RagPipeline, RagPipelineBuilder, build_context, build_prompt};
pub use retry::RetryPolicy;
pub use vectorstore::VectorStore;

#[cfg(feature = "openai")]
pub use openai::{OpenAICompletionProvider, OpenAIEmbeddingProvider};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
