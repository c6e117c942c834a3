//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::{CollectionSchema, Hit, Point};
use crate::error::{RagError, Result};

/// A storage backend for vector embeddings with similarity search.
///
/// Collections are bound to a [`CollectionSchema`] at creation and never
/// change afterwards. Implementations must be safe to call concurrently,
/// including concurrent `ensure_collection` calls for the same name.
///
/// # Example
///
/// ```rust,ignore
/// use brain_rag::{CollectionSchema, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_collection("documents", CollectionSchema::cosine(384)).await?;
/// store.upsert("documents", &points).await?;
/// let hits = store.search("documents", &query_vector, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create `name` with `schema` if it does not exist yet.
    ///
    /// An existing collection is left untouched when its schema matches and
    /// rejected with [`RagError::SchemaMismatch`] when it does not.
    async fn ensure_collection(&self, name: &str, schema: CollectionSchema) -> Result<()>;

    /// The schema of `name`, or `None` if the collection does not exist.
    async fn collection_schema(&self, name: &str) -> Result<Option<CollectionSchema>>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or overwrite points by id.
    ///
    /// Fails with [`RagError::DimensionMismatch`] before writing anything if a
    /// vector's length disagrees with the collection's dimensionality.
    async fn upsert(&self, collection: &str, points: &[Point]) -> Result<()>;

    /// Delete points by their ids.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// The subset of `ids` already stored in `collection`.
    ///
    /// A missing collection holds no ids.
    async fn existing_ids(&self, collection: &str, ids: &[&str]) -> Result<Vec<String>>;

    /// The `top_k` points most similar to `vector`, best first.
    ///
    /// An empty or missing collection yields an empty list.
    async fn search(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<Hit>>;
}

/// Compare a requested schema against the one a collection already has.
pub fn check_schema(
    collection: &str,
    expected: CollectionSchema,
    actual: CollectionSchema,
) -> Result<()> {
    if expected != actual {
        return Err(RagError::SchemaMismatch {
            collection: collection.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Ensure every point's vector has the collection's dimensionality.
pub fn check_dimensions(
    collection: &str,
    schema: CollectionSchema,
    points: &[Point],
) -> Result<()> {
    match points.iter().find(|p| p.vector.len() != schema.dimensions) {
        Some(point) => Err(RagError::DimensionMismatch {
            collection: collection.to_string(),
            expected: schema.dimensions,
            actual: point.vector.len(),
        }),
        None => Ok(()),
    }
}

/// Ensure a query vector has the collection's dimensionality.
pub fn check_query_dimensions(
    collection: &str,
    schema: CollectionSchema,
    vector: &[f32],
) -> Result<()> {
    if vector.len() != schema.dimensions {
        return Err(RagError::DimensionMismatch {
            collection: collection.to_string(),
            expected: schema.dimensions,
            actual: vector.len(),
        });
    }
    Ok(())
}
