//! In-memory vector store using brute-force similarity scoring.
//!
//! This module provides [`InMemoryVectorStore`], a dependency-free store
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and small-scale use cases.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{CollectionSchema, DistanceMetric, Hit, Point};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, check_dimensions, check_query_dimensions, check_schema};

const BACKEND: &str = "in-memory";

#[derive(Debug)]
struct Collection {
    schema: CollectionSchema,
    points: HashMap<String, Point>,
}

/// An in-memory vector store.
///
/// Collections are stored as nested `HashMap`s: collection name → point id →
/// point. The write lock makes check-then-create atomic, so concurrent
/// `ensure_collection` calls never race.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points stored in `collection` (zero if it does not exist).
    pub async fn len(&self, collection: &str) -> usize {
        self.collections.read().await.get(collection).map_or(0, |c| c.points.len())
    }

    /// Whether `collection` holds no points.
    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    fn missing(collection: &str) -> RagError {
        RagError::VectorStore {
            backend: BACKEND.to_string(),
            message: format!("collection '{collection}' does not exist"),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Higher is always better, so Euclidean distance is negated.
fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(a, b),
        DistanceMetric::Dot => dot(a, b),
        DistanceMetric::Euclidean => {
            -a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, name: &str, schema: CollectionSchema) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(name) {
            return check_schema(name, schema, existing.schema);
        }
        collections.insert(name.to_string(), Collection { schema, points: HashMap::new() });
        Ok(())
    }

    async fn collection_schema(&self, name: &str) -> Result<Option<CollectionSchema>> {
        Ok(self.collections.read().await.get(name).map(|c| c.schema))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[Point]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        check_dimensions(collection, store.schema, points)?;
        for point in points {
            store.points.insert(point.id.clone(), point.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        for id in ids {
            store.points.remove(*id);
        }
        Ok(())
    }

    async fn existing_ids(&self, collection: &str, ids: &[&str]) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        let Some(store) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter(|id| store.points.contains_key(**id))
            .map(|id| id.to_string())
            .collect())
    }

    async fn search(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<Hit>> {
        let collections = self.collections.read().await;
        let Some(store) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        check_query_dimensions(collection, store.schema, vector)?;

        let mut hits: Vec<Hit> = store
            .points
            .values()
            .map(|point| Hit {
                id: point.id.clone(),
                score: score(store.schema.metric, &point.vector, vector),
                payload: point.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PointPayload;

    fn point(id: &str, vector: Vec<f32>) -> Point {
        Point {
            id: id.to_string(),
            vector,
            payload: PointPayload {
                text: format!("text of {id}"),
                document_id: "doc".to_string(),
                chunk_index: 0,
                source: "doc.txt".to_string(),
            },
        }
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn euclidean_prefers_closer_points() {
        let near = score(DistanceMetric::Euclidean, &[1.0, 0.0], &[1.1, 0.0]);
        let far = score(DistanceMetric::Euclidean, &[1.0, 0.0], &[5.0, 0.0]);
        assert!(near > far);
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent_and_schema_checked() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", CollectionSchema::cosine(3)).await.unwrap();
        store.ensure_collection("docs", CollectionSchema::cosine(3)).await.unwrap();

        let err = store.ensure_collection("docs", CollectionSchema::cosine(4)).await.unwrap_err();
        assert!(matches!(err, RagError::SchemaMismatch { .. }));

        let err = store
            .ensure_collection("docs", CollectionSchema::new(3, DistanceMetric::Dot))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimensions_without_writing() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", CollectionSchema::cosine(2)).await.unwrap();

        let points = vec![point("a", vec![1.0, 0.0]), point("b", vec![1.0, 0.0, 0.0])];
        let err = store.upsert("docs", &points).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3, .. }));
        assert!(store.is_empty("docs").await);
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", CollectionSchema::cosine(2)).await.unwrap();
        store.upsert("docs", &[point("a", vec![1.0, 0.0])]).await.unwrap();
        store.upsert("docs", &[point("a", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.len("docs").await, 1);

        let hits = store.search("docs", &[0.0, 1.0], 5).await.unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_fails() {
        let store = InMemoryVectorStore::new();
        let err = store.upsert("nope", &[point("a", vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStore { .. }));
    }

    #[tokio::test]
    async fn search_on_missing_or_empty_collection_is_empty() {
        let store = InMemoryVectorStore::new();
        assert!(store.search("nope", &[1.0, 0.0], 5).await.unwrap().is_empty());

        store.ensure_collection("docs", CollectionSchema::cosine(2)).await.unwrap();
        assert!(store.search("docs", &[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_points() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", CollectionSchema::cosine(2)).await.unwrap();
        store
            .upsert("docs", &[point("a", vec![1.0, 0.0]), point("b", vec![0.0, 1.0])])
            .await
            .unwrap();
        store.delete("docs", &["a"]).await.unwrap();
        assert_eq!(store.len("docs").await, 1);
        assert_eq!(store.existing_ids("docs", &["a", "b", "c"]).await.unwrap(), vec!["b"]);
        assert!(store.existing_ids("nope", &["b"]).await.unwrap().is_empty());
    }
}
