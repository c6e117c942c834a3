//! Configuration for the RAG pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// The collection documents are ingested into unless configured otherwise.
pub const DEFAULT_COLLECTION: &str = "documents";

/// The persona handed to the completion provider as the system message.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are The Brain assistant.";

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Name of the vector store collection.
    pub collection: String,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Minimum similarity score for results. `None` keeps every hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    /// System message sent ahead of every prompt.
    pub system_prompt: String,
    /// Maximum number of points sent to the store per upsert call.
    pub upsert_batch_size: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            similarity_threshold: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            upsert_batch_size: 256,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the system message.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    /// Set the number of points per upsert call.
    pub fn upsert_batch_size(mut self, size: usize) -> Self {
        self.config.upsert_batch_size = size;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidChunkConfig`] if `chunk_overlap >= chunk_size`.
    ///
    /// Returns [`RagError::Config`] if:
    /// - `top_k == 0`
    /// - `upsert_batch_size == 0`
    /// - the collection name is blank
    pub fn build(self) -> Result<RagConfig> {
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(RagError::InvalidChunkConfig {
                size: self.config.chunk_size,
                overlap: self.config.chunk_overlap,
            });
        }
        if self.config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.config.upsert_batch_size == 0 {
            return Err(RagError::Config(
                "upsert_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.config.collection.trim().is_empty() {
            return Err(RagError::Config("collection name must not be empty".to_string()));
        }
        Ok(self.config)
    }
}
