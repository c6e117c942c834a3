//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use brain_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334", None)?;
//! store.ensure_collection("documents", CollectionSchema::cosine(4096)).await?;
//! store.upsert("documents", &points).await?;
//! let hits = store.search("documents", &query_vector, 5).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfig;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, GetPointsBuilder, PointId, PointStruct,
    PointsIdsList, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::document::{CollectionSchema, DistanceMetric, Hit, Point, PointPayload};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, check_dimensions, check_query_dimensions, check_schema};

const BACKEND: &str = "qdrant";

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Wraps a [`qdrant_client::Qdrant`] client. Collection schemas read from or
/// written to the server are cached so upserts and searches can validate
/// dimensions locally without an extra round trip. `ensure_collection` always
/// asks the server, and a failed upsert or search re-reads the schema, so an
/// entry never outlives a collection dropped behind the store's back.
pub struct QdrantVectorStore {
    client: Qdrant,
    schemas: RwLock<HashMap<String, CollectionSchema>>,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given gRPC URL.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self> {
        let mut config = Qdrant::from_url(url);
        if let Some(key) = api_key {
            config = config.api_key(key);
        }
        let client = config.build().map_err(Self::map_err)?;
        Ok(Self::from_client(client))
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client, schemas: RwLock::new(HashMap::new()) }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStore { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn store_error(message: String) -> RagError {
        RagError::VectorStore { backend: BACKEND.to_string(), message }
    }

    fn missing(collection: &str) -> RagError {
        Self::store_error(format!("collection '{collection}' does not exist"))
    }

    fn distance(metric: DistanceMetric) -> Distance {
        match metric {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Dot => Distance::Dot,
            DistanceMetric::Euclidean => Distance::Euclid,
        }
    }

    fn metric(collection: &str, distance: i32) -> Result<DistanceMetric> {
        match Distance::try_from(distance) {
            Ok(Distance::Cosine) => Ok(DistanceMetric::Cosine),
            Ok(Distance::Dot) => Ok(DistanceMetric::Dot),
            Ok(Distance::Euclid) => Ok(DistanceMetric::Euclidean),
            _ => Err(Self::store_error(format!(
                "collection '{collection}' uses unsupported distance {distance}"
            ))),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let collections = self.client.list_collections().await.map_err(Self::map_err)?;
        Ok(collections.collections.iter().any(|c| c.name == name))
    }

    /// Read a collection's schema from the server.
    async fn fetch_schema(&self, name: &str) -> Result<Option<CollectionSchema>> {
        if !self.exists(name).await? {
            return Ok(None);
        }

        let info = self.client.collection_info(name).await.map_err(Self::map_err)?;
        let vectors = info
            .result
            .and_then(|i| i.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        match vectors {
            Some(VectorsConfig::Params(params)) => Ok(Some(CollectionSchema::new(
                params.size as usize,
                Self::metric(name, params.distance)?,
            ))),
            Some(VectorsConfig::ParamsMap(_)) => Err(Self::store_error(format!(
                "collection '{name}' uses named vectors, which are not supported"
            ))),
            None => Err(Self::store_error(format!(
                "collection '{name}' reports no vector configuration"
            ))),
        }
    }

    /// Cached schema, falling back to the server.
    async fn schema(&self, name: &str) -> Result<Option<CollectionSchema>> {
        if let Some(schema) = self.schemas.read().await.get(name) {
            return Ok(Some(*schema));
        }
        self.refresh_schema(name).await
    }

    /// Schema straight from the server, with the cache brought in line.
    async fn refresh_schema(&self, name: &str) -> Result<Option<CollectionSchema>> {
        let fetched = self.fetch_schema(name).await?;
        let mut schemas = self.schemas.write().await;
        match fetched {
            Some(schema) => schemas.insert(name.to_string(), schema),
            None => schemas.remove(name),
        };
        Ok(fetched)
    }

    /// Outcome of a create that failed: fine if the collection now exists
    /// with the requested schema, otherwise the schema or create error.
    fn resolve_failed_create(
        name: &str,
        requested: CollectionSchema,
        reread: Option<CollectionSchema>,
        create_error: RagError,
    ) -> Result<()> {
        match reread {
            Some(actual) => check_schema(name, requested, actual),
            None => Err(create_error),
        }
    }

    /// Compare the schema a failed call relied on with a fresh read.
    fn after_failure(cached: CollectionSchema, current: Option<CollectionSchema>) -> Refreshed {
        match current {
            None => Refreshed::Gone,
            Some(schema) if schema == cached => Refreshed::Unchanged,
            Some(schema) => Refreshed::Changed(schema),
        }
    }

    fn id_string(id: Option<PointId>) -> String {
        id.and_then(|pid| pid.point_id_options)
            .map(|options| match options {
                PointIdOptions::Uuid(s) => s,
                PointIdOptions::Num(n) => n.to_string(),
            })
            .unwrap_or_default()
    }

    fn to_point_struct(point: &Point) -> Result<PointStruct> {
        let json = serde_json::to_value(&point.payload)
            .map_err(|e| Self::store_error(format!("failed to encode payload: {e}")))?;
        let payload = Payload::try_from(json).map_err(Self::map_err)?;
        Ok(PointStruct::new(point.id.clone(), point.vector.clone(), payload))
    }

    fn string_field(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<String> {
        match payload.get(key).and_then(|v| v.kind.as_ref()) {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn index_field(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<usize> {
        match payload.get(key).and_then(|v| v.kind.as_ref()) {
            Some(Kind::IntegerValue(i)) => usize::try_from(*i).ok(),
            Some(Kind::DoubleValue(d)) if *d >= 0.0 => Some(*d as usize),
            _ => None,
        }
    }

    fn to_hit(scored: ScoredPoint) -> Result<Hit> {
        let id = Self::id_string(scored.id);

        let text = Self::string_field(&scored.payload, "text")
            .ok_or_else(|| Self::store_error(format!("point '{id}' has no text payload")))?;

        Ok(Hit {
            payload: PointPayload {
                text,
                document_id: Self::string_field(&scored.payload, "document_id")
                    .unwrap_or_default(),
                chunk_index: Self::index_field(&scored.payload, "chunk_index").unwrap_or_default(),
                source: Self::string_field(&scored.payload, "source").unwrap_or_default(),
            },
            id,
            score: scored.score,
        })
    }
}

/// What a re-read tells a call that failed against a cached schema.
#[derive(Debug, PartialEq, Eq)]
enum Refreshed {
    /// The collection no longer exists.
    Gone,
    /// Same schema; the failure was something else.
    Unchanged,
    /// The collection was recreated with another schema.
    Changed(CollectionSchema),
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, name: &str, schema: CollectionSchema) -> Result<()> {
        if let Some(actual) = self.refresh_schema(name).await? {
            debug!(collection = name, "qdrant collection already exists, skipping creation");
            return check_schema(name, schema, actual);
        }

        let created = self
            .client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(
                VectorParamsBuilder::new(schema.dimensions as u64, Self::distance(schema.metric)),
            ))
            .await;

        if let Err(e) = created {
            // Someone else may have created it between our check and create.
            let reread = self.refresh_schema(name).await?;
            if reread.is_some() {
                warn!(collection = name, error = %e, "collection created concurrently");
            }
            return Self::resolve_failed_create(name, schema, reread, Self::map_err(e));
        }

        debug!(collection = name, %schema, "created qdrant collection");
        self.schemas.write().await.insert(name.to_string(), schema);
        Ok(())
    }

    async fn collection_schema(&self, name: &str) -> Result<Option<CollectionSchema>> {
        self.schema(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(Self::map_err)?;
        self.schemas.write().await.remove(name);
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let schema = self.schema(collection).await?.ok_or_else(|| Self::missing(collection))?;
        check_dimensions(collection, schema, points)?;

        let structs = points.iter().map(Self::to_point_struct).collect::<Result<Vec<_>>>()?;
        let request =
            |structs: Vec<PointStruct>| UpsertPointsBuilder::new(collection, structs).wait(true);

        if let Err(e) = self.client.upsert_points(request(structs.clone())).await {
            let current = self.refresh_schema(collection).await?;
            let current = match Self::after_failure(schema, current) {
                Refreshed::Gone => return Err(Self::missing(collection)),
                Refreshed::Unchanged => return Err(Self::map_err(e)),
                Refreshed::Changed(current) => current,
            };
            warn!(collection, error = %e, "collection was recreated, retrying upsert");
            check_dimensions(collection, current, points)?;
            self.client.upsert_points(request(structs)).await.map_err(Self::map_err)?;
        }

        debug!(collection, count = points.len(), "upserted points to qdrant");
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| (*id).into()).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList { ids: point_ids })
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = ids.len(), "deleted points from qdrant");
        Ok(())
    }

    async fn existing_ids(&self, collection: &str, ids: &[&str]) -> Result<Vec<String>> {
        if ids.is_empty() || self.schema(collection).await?.is_none() {
            return Ok(Vec::new());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| (*id).into()).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, point_ids)
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await
            .map_err(Self::map_err)?;

        Ok(response.result.into_iter().map(|point| Self::id_string(point.id)).collect())
    }

    async fn search(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<Hit>> {
        let Some(schema) = self.schema(collection).await? else {
            debug!(collection, "search against missing collection");
            return Ok(Vec::new());
        };
        check_query_dimensions(collection, schema, vector)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let request = || {
            SearchPointsBuilder::new(collection, vector.to_vec(), top_k as u64).with_payload(true)
        };

        let response = match self.client.search_points(request()).await {
            Ok(response) => response,
            Err(e) => match Self::after_failure(schema, self.refresh_schema(collection).await?) {
                Refreshed::Gone => {
                    debug!(collection, "collection disappeared, no hits");
                    return Ok(Vec::new());
                }
                Refreshed::Unchanged => return Err(Self::map_err(e)),
                Refreshed::Changed(current) => {
                    warn!(collection, error = %e, "collection was recreated, retrying search");
                    check_query_dimensions(collection, current, vector)?;
                    self.client.search_points(request()).await.map_err(Self::map_err)?
                }
            },
        };

        response.result.into_iter().map(Self::to_hit).collect()
    }
}
