//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific embedding backend behind a unified async
/// interface. Ingestion sends every chunk of a document through a single
/// [`embed_batch`](EmbeddingProvider::embed_batch) call; queries go through
/// [`embed`](EmbeddingProvider::embed), a batch of one.
///
/// # Example
///
/// ```rust,ignore
/// use brain_rag::EmbeddingProvider;
///
/// let vectors = provider.embed_batch(&["first chunk", "second chunk"]).await?;
/// assert_eq!(vectors.len(), 2);
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate one embedding per input text, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_batch(&[text]).await?;
        let count = vectors.len();
        let mut vectors = vectors.into_iter();
        match (vectors.next(), count) {
            (Some(vector), 1) => Ok(vector),
            _ => Err(RagError::EmbeddingShape {
                provider: self.name().to_string(),
                message: format!("expected 1 embedding, got {count}"),
            }),
        }
    }
}

/// Check that a provider response holds `expected` non-empty vectors of one length.
///
/// Returns the shared dimensionality (zero when `expected` is zero).
///
/// # Errors
///
/// Returns [`RagError::EmbeddingShape`] on any violation.
pub fn validate_batch(provider: &str, expected: usize, vectors: &[Vec<f32>]) -> Result<usize> {
    let shape_error =
        |message: String| RagError::EmbeddingShape { provider: provider.to_string(), message };

    if vectors.len() != expected {
        return Err(shape_error(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )));
    }

    let Some(first) = vectors.first() else {
        return Ok(0);
    };
    let dimensions = first.len();
    if dimensions == 0 {
        return Err(shape_error("provider returned an empty embedding".to_string()));
    }
    if let Some((position, vector)) =
        vectors.iter().enumerate().find(|(_, v)| v.len() != dimensions)
    {
        return Err(shape_error(format!(
            "embedding {position} has {} dimensions, expected {dimensions}",
            vector.len()
        )));
    }

    Ok(dimensions)
}
