//! OpenAI-compatible providers against a local stub server.

#![cfg(feature = "openai")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use brain_rag::completion::{ChatMessage, CompletionProvider};
use brain_rag::embedding::EmbeddingProvider;
use brain_rag::error::RagError;
use brain_rag::openai::{OpenAICompletionProvider, OpenAIEmbeddingProvider};
use brain_rag::retry::RetryPolicy;
use serde_json::{Value, json};

/// Serve `router` on an ephemeral port and return its `/v1` base URL.
async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}/v1")
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn embeddings_are_returned_in_input_order() {
    let router = Router::new().route(
        "/v1/embeddings",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "nomic");
            let inputs = body["input"].as_array().unwrap().clone();
            // Answer in reverse order, relying on `index`.
            let data: Vec<Value> = inputs
                .iter()
                .enumerate()
                .rev()
                .map(|(i, _)| json!({"index": i, "embedding": [i as f32, 1.0]}))
                .collect();
            Json(json!({"data": data}))
        }),
    );
    let base = spawn(router).await;

    let provider = OpenAIEmbeddingProvider::new(&base, "nomic").unwrap();
    let vectors = provider.embed_batch(&["a", "b", "c"]).await.unwrap();
    assert_eq!(vectors, vec![vec![0.0, 1.0], vec![1.0, 1.0], vec![2.0, 1.0]]);

    assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn wrong_number_of_embeddings_is_a_shape_error() {
    let router = Router::new().route(
        "/v1/embeddings",
        post(|| async { Json(json!({"data": [{"embedding": [0.5, 0.5]}]})) }),
    );
    let base = spawn(router).await;

    let provider = OpenAIEmbeddingProvider::new(&base, "nomic").unwrap();
    let err = provider.embed_batch(&["a", "b"]).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingShape { .. }));
}

#[tokio::test]
async fn ragged_embeddings_are_a_shape_error() {
    let router = Router::new().route(
        "/v1/embeddings",
        post(|| async {
            Json(json!({"data": [{"embedding": [0.5, 0.5]}, {"embedding": [0.5]}]}))
        }),
    );
    let base = spawn(router).await;

    let provider = OpenAIEmbeddingProvider::new(&base, "nomic").unwrap();
    let err = provider.embed_batch(&["a", "b"]).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingShape { .. }));
}

#[tokio::test]
async fn unavailable_provider_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        "/v1/embeddings",
        post(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": {"message": "loading"}})))
                } else {
                    (StatusCode::OK, Json(json!({"data": [{"index": 0, "embedding": [1.0]}]})))
                }
            }
        }),
    );
    let base = spawn(router).await;

    let provider = OpenAIEmbeddingProvider::new(&base, "nomic").unwrap().with_retry(fast_retry());
    let vector = provider.embed("hello").await.unwrap();
    assert_eq!(vector, vec![1.0]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        "/v1/embeddings",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::BAD_REQUEST, Json(json!({"error": {"message": "model not found"}})))
            }
        }),
    );
    let base = spawn(router).await;

    let provider = OpenAIEmbeddingProvider::new(&base, "nomic").unwrap().with_retry(fast_retry());
    let err = provider.embed("hello").await.unwrap_err();
    match err {
        RagError::EmbeddingProvider { message, retryable, .. } => {
            assert!(!retryable);
            assert!(message.contains("model not found"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refused_connection_is_retryable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider = OpenAIEmbeddingProvider::new(&format!("http://{addr}/v1"), "nomic")
        .unwrap()
        .with_retry(RetryPolicy::none());
    let err = provider.embed("hello").await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingProvider { retryable: true, .. }));
}

#[tokio::test]
async fn completion_returns_first_choice() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "llama2");
            assert_eq!(body["messages"][0]["role"], "system");
            assert_eq!(body["messages"][1]["role"], "user");
            let question = body["messages"][1]["content"].as_str().unwrap().to_string();
            Json(json!({
                "choices": [
                    {"message": {"role": "assistant", "content": format!("echo: {question}")}},
                    {"message": {"role": "assistant", "content": "second"}}
                ]
            }))
        }),
    );
    let base = spawn(router).await;

    let provider = OpenAICompletionProvider::new(&base, "llama2").unwrap();
    let answer = provider
        .complete(&[ChatMessage::system("be brief"), ChatMessage::user("hi")])
        .await
        .unwrap();
    assert_eq!(answer, "echo: hi");
}

#[tokio::test]
async fn completion_without_choices_is_fatal() {
    let router = Router::new()
        .route("/v1/chat/completions", post(|| async { Json(json!({"choices": []})) }));
    let base = spawn(router).await;

    let provider = OpenAICompletionProvider::new(&base, "llama2").unwrap();
    let err = provider.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
    assert!(matches!(err, RagError::CompletionProvider { retryable: false, .. }));
}

#[tokio::test]
async fn slow_completion_times_out_without_retry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"choices": [{"message": {"content": "late"}}]}))
            }
        }),
    );
    let base = spawn(router).await;

    let provider = OpenAICompletionProvider::new(&base, "llama2")
        .unwrap()
        .with_timeout(Duration::from_millis(200))
        .with_retry(fast_retry());
    let err = provider.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
    assert!(matches!(err, RagError::CompletionTimeout { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
