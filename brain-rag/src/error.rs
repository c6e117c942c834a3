//! Error types for the `brain-rag` crate.

use thiserror::Error;

use crate::document::CollectionSchema;

/// Errors that can occur while ingesting documents or answering queries.
#[derive(Debug, Error)]
pub enum RagError {
    /// The uploaded file is malformed for its declared format.
    #[error("Extraction error ({format}): {message}")]
    Extraction {
        /// The declared document format.
        format: String,
        /// A description of the failure.
        message: String,
    },

    /// A plain-text document is not valid UTF-8.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The chunk overlap does not leave the window room to advance.
    #[error("Invalid chunk config: overlap ({overlap}) must be less than size ({size})")]
    InvalidChunkConfig {
        /// The requested window size.
        size: usize,
        /// The requested overlap.
        overlap: usize,
    },

    /// The embedding provider was unreachable or returned an error status.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingProvider {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether a later attempt could succeed.
        retryable: bool,
    },

    /// The embedding provider answered with the wrong number or shape of vectors.
    #[error("Embedding shape error ({provider}): {message}")]
    EmbeddingShape {
        /// The embedding provider that produced the response.
        provider: String,
        /// A description of the mismatch.
        message: String,
    },

    /// A vector's length disagrees with the collection's bound dimensionality.
    #[error(
        "Dimension mismatch in collection '{collection}': expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        /// The target collection.
        collection: String,
        /// The collection's dimensionality.
        expected: usize,
        /// The offending vector length.
        actual: usize,
    },

    /// An existing collection was created with a different schema.
    #[error("Schema mismatch in collection '{collection}': expected {expected}, found {actual}")]
    SchemaMismatch {
        /// The collection name.
        collection: String,
        /// The schema the caller asked for.
        expected: CollectionSchema,
        /// The schema the store reports.
        actual: CollectionSchema,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Retrieval produced no hits for a query.
    #[error("No relevant context found")]
    NoContextFound,

    /// The completion provider failed.
    #[error("Completion error ({provider}): {message}")]
    CompletionProvider {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether a later attempt could succeed.
        retryable: bool,
    },

    /// The completion provider did not answer within its deadline.
    #[error("Completion timeout ({provider}): no answer within {seconds}s")]
    CompletionTimeout {
        /// The completion provider.
        provider: String,
        /// The deadline that elapsed.
        seconds: u64,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Whether the failure is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmbeddingProvider { retryable, .. }
            | Self::CompletionProvider { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
