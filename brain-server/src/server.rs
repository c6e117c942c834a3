use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State, multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::HeaderValue,
    routing::{get, post},
};
use brain_rag::{
    Document, OpenAICompletionProvider, OpenAIEmbeddingProvider, QdrantVectorStore, RagPipeline,
    RetryPolicy,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
}

impl AppState {
    pub fn new(pipeline: RagPipeline) -> Self {
        Self { pipeline: Arc::new(pipeline) }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub chunks: usize,
}

/// Wire the production pipeline: OpenAI-compatible providers and Qdrant.
pub fn build_pipeline(config: &ServerConfig) -> anyhow::Result<RagPipeline> {
    let retry = RetryPolicy::default().with_max_attempts(config.retry_max_attempts);

    let mut embedder =
        OpenAIEmbeddingProvider::new(&config.embedding_base_url, config.embedding_model.clone())
            .context("invalid embedding provider settings")?
            .with_retry(retry);
    let mut completer =
        OpenAICompletionProvider::new(&config.completion_base_url, config.completion_model.clone())
            .context("invalid completion provider settings")?
            .with_timeout(config.completion_timeout)
            .with_retry(retry);
    if let Some(key) = &config.provider_api_key {
        embedder = embedder.with_api_key(key.clone());
        completer = completer.with_api_key(key.clone());
    }

    let store = QdrantVectorStore::new(&config.qdrant_url, config.qdrant_api_key.clone())
        .with_context(|| format!("failed to create Qdrant client for {}", config.qdrant_url))?;

    let pipeline = RagPipeline::builder()
        .config(config.rag.clone())
        .embedding_provider(Arc::new(embedder))
        .vector_store(Arc::new(store))
        .completion_provider(Arc::new(completer))
        .build()?;
    Ok(pipeline)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };

    CorsLayer::new().allow_origin(allow_origin).allow_methods(Any).allow_headers(Any)
}

pub fn app_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/ingest", post(ingest))
        .route("/query", post(query))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config)?;
    let app = app_router(AppState::new(pipeline), &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(
        addr = %config.bind_addr,
        collection = %config.rag.collection,
        qdrant = %config.qdrant_url,
        embedding_model = %config.embedding_model,
        completion_model = %config.completion_model,
        "brain-server listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("brain-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}

async fn health() -> Json<Value> {
    Json(json!({"status": "AI-Router is alive!"}))
}

async fn ingest(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let document = read_upload(&mut multipart).await?;
    debug!(
        filename = %document.filename,
        format = %document.format,
        bytes = document.bytes.len(),
        "received upload"
    );

    let report = state.pipeline.ingest(&document).await?;
    Ok(Json(IngestResponse { status: "ok".to_string(), chunks: report.chunks }))
}

/// The first `file` field of the form, read fully into memory.
async fn read_upload(multipart: &mut Multipart) -> Result<Document, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("uploaded file has no filename".to_string()))?;
        let bytes = field.bytes().await?;
        return Ok(Document::new(filename, bytes.to_vec()));
    }

    Err(ApiError::BadRequest("missing multipart field 'file'".to_string()))
}

async fn query(
    State(state): State<AppState>,
    request: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    let answer = state.pipeline.query(&request.question).await?;
    Ok(Json(QueryResponse { answer: answer.answer }))
}
