//! End-to-end HTTP contract against an in-memory pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use brain_rag::{
    ChatMessage, CompletionProvider, EmbeddingProvider, InMemoryVectorStore, RagConfig, RagError,
    RagPipeline,
};
use brain_server::{AppState, ServerConfig, app_router};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

/// Letter-frequency vectors, so texts sharing letters score as similar.
struct LetterEmbedder;

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    fn name(&self) -> &str {
        "letters"
    }

    async fn embed_batch(&self, texts: &[&str]) -> brain_rag::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0; 27];
                for c in text.chars() {
                    match c.to_ascii_lowercase() {
                        l @ 'a'..='z' => vector[(l as u8 - b'a') as usize] += 1.0,
                        _ => vector[26] += 0.01,
                    }
                }
                vector
            })
            .collect())
    }
}

struct DownEmbedder;

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    fn name(&self) -> &str {
        "down"
    }

    async fn embed_batch(&self, _texts: &[&str]) -> brain_rag::Result<Vec<Vec<f32>>> {
        Err(RagError::EmbeddingProvider {
            provider: "down".to_string(),
            message: "connection refused".to_string(),
            retryable: true,
        })
    }
}

/// Answers with the user prompt it was given.
struct EchoLlm;

#[async_trait]
impl CompletionProvider for EchoLlm {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> brain_rag::Result<String> {
        Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
    }
}

async fn spawn_server_with(
    embedder: Arc<dyn EmbeddingProvider>,
    config: ServerConfig,
) -> (String, tokio::task::JoinHandle<()>) {
    let pipeline = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(embedder)
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .completion_provider(Arc::new(EchoLlm))
        .build()
        .expect("pipeline");
    let app = app_router(AppState::new(pipeline), &config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{addr}"), handle)
}

async fn spawn_server() -> (String, tokio::task::JoinHandle<()>) {
    spawn_server_with(Arc::new(LetterEmbedder), ServerConfig::default()).await
}

fn upload(filename: &str, bytes: Vec<u8>) -> Form {
    Form::new().part("file", Part::bytes(bytes).file_name(filename.to_string()))
}

fn alphabet_text(len: usize) -> String {
    (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect()
}

#[tokio::test]
async fn liveness_payload() {
    let (base, handle) = spawn_server().await;

    let response = reqwest::get(format!("{base}/")).await.expect("liveness response");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("liveness json");
    assert_eq!(body, json!({"status": "AI-Router is alive!"}));

    handle.abort();
}

#[tokio::test]
async fn ingest_reports_chunk_count() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/ingest"))
        .multipart(upload("notes.txt", alphabet_text(2400).into_bytes()))
        .send()
        .await
        .expect("ingest response");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("ingest json");
    assert_eq!(body, json!({"status": "ok", "chunks": 3}));

    handle.abort();
}

#[tokio::test]
async fn query_before_ingest_is_not_found() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/query"))
        .json(&json!({"question": "anything there?"}))
        .send()
        .await
        .expect("query response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.expect("error json");
    assert_eq!(body["detail"], "No relevant context found");

    handle.abort();
}

#[tokio::test]
async fn query_answers_from_ingested_context() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let ingest = client
        .post(format!("{base}/ingest"))
        .multipart(upload("cats.txt", b"Cats sleep sixteen hours a day.".to_vec()))
        .send()
        .await
        .expect("ingest response");
    assert!(ingest.status().is_success());

    let response = client
        .post(format!("{base}/query"))
        .json(&json!({"question": "How long do cats sleep?"}))
        .send()
        .await
        .expect("query response");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("answer json");
    assert_eq!(
        body["answer"],
        "Context:\nCats sleep sixteen hours a day.\n\nQuestion: How long do cats sleep?"
    );

    handle.abort();
}

#[tokio::test]
async fn question_reaches_the_prompt_verbatim() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let ingest = client
        .post(format!("{base}/ingest"))
        .multipart(upload("cats.txt", b"Cats sleep sixteen hours a day.".to_vec()))
        .send()
        .await
        .expect("ingest response");
    assert!(ingest.status().is_success());

    let response = client
        .post(format!("{base}/query"))
        .json(&json!({"question": "  How long do cats sleep?\n"}))
        .send()
        .await
        .expect("query response");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("answer json");
    assert_eq!(
        body["answer"],
        "Context:\nCats sleep sixteen hours a day.\n\nQuestion:   How long do cats sleep?\n"
    );

    handle.abort();
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let no_file = client
        .post(format!("{base}/ingest"))
        .multipart(Form::new().text("note", "no file here"))
        .send()
        .await
        .expect("ingest response");
    assert_eq!(no_file.status(), StatusCode::BAD_REQUEST);
    let body: Value = no_file.json().await.expect("error json");
    assert!(body["detail"].as_str().unwrap().contains("file"));

    let not_utf8 = client
        .post(format!("{base}/ingest"))
        .multipart(upload("binary.txt", vec![0xff, 0xfe, 0xfd]))
        .send()
        .await
        .expect("ingest response");
    assert_eq!(not_utf8.status(), StatusCode::BAD_REQUEST);

    let broken_pdf = client
        .post(format!("{base}/ingest"))
        .multipart(upload("report.PDF", b"definitely not a pdf".to_vec()))
        .send()
        .await
        .expect("ingest response");
    assert_eq!(broken_pdf.status(), StatusCode::BAD_REQUEST);

    let blank_question = client
        .post(format!("{base}/query"))
        .json(&json!({"question": "   "}))
        .send()
        .await
        .expect("query response");
    assert_eq!(blank_question.status(), StatusCode::BAD_REQUEST);

    let missing_question = client
        .post(format!("{base}/query"))
        .json(&json!({"prompt": "hi"}))
        .send()
        .await
        .expect("query response");
    assert_eq!(missing_question.status(), StatusCode::BAD_REQUEST);

    handle.abort();
}

#[tokio::test]
async fn provider_outage_is_bad_gateway() {
    let (base, handle) = spawn_server_with(Arc::new(DownEmbedder), ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/ingest"))
        .multipart(upload("notes.txt", b"some text".to_vec()))
        .send()
        .await
        .expect("ingest response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.expect("error json");
    assert!(body["detail"].as_str().unwrap().contains("connection refused"));

    handle.abort();
}

#[tokio::test]
async fn cors_allows_configured_origin_only() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let preflight = |origin: &'static str| {
        client
            .request(Method::OPTIONS, format!("{base}/query"))
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .send()
    };

    let allowed = preflight("http://localhost:3000").await.expect("preflight response");
    assert_eq!(
        allowed.headers().get("access-control-allow-origin").and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );

    let denied = preflight("http://evil.test").await.expect("preflight response");
    assert!(denied.headers().get("access-control-allow-origin").is_none());

    handle.abort();
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let config = ServerConfig { max_upload_bytes: 1024, ..ServerConfig::default() };
    let (base, handle) = spawn_server_with(Arc::new(LetterEmbedder), config).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/ingest"))
        .multipart(upload("big.txt", alphabet_text(8 * 1024).into_bytes()))
        .send()
        .await
        .expect("ingest response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    handle.abort();
}
