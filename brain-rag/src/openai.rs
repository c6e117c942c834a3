//! OpenAI-compatible embedding and chat-completion providers.
//!
//! Both providers speak the `/v1/embeddings` and `/v1/chat/completions`
//! wire formats, which Ollama, vLLM and OpenAI itself all serve. Responses
//! are decoded into explicit structs and validated before they leave this
//! module.
//!
//! This module is only available when the `openai` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::{ChatMessage, CompletionProvider};
use crate::embedding::{EmbeddingProvider, validate_batch};
use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Base URL of a local Ollama server's OpenAI-compatible API.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434/v1";

/// Model used for both embeddings and completions unless configured otherwise.
pub const DEFAULT_MODEL: &str = "llama2";

/// Deadline for a single chat-completion request.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "openai";

/// Join `base_url` and `path`, rejecting URLs reqwest cannot use.
fn endpoint(base_url: &str, path: &str) -> Result<String> {
    let joined = format!("{}/{path}", base_url.trim_end_matches('/'));
    Url::parse(&joined)
        .map_err(|e| RagError::Config(format!("invalid provider URL '{base_url}': {e}")))?;
    Ok(joined)
}

fn require_model(model: String) -> Result<String> {
    if model.trim().is_empty() {
        return Err(RagError::Config("model must not be empty".to_string()));
    }
    Ok(model)
}

/// Whether an HTTP status is worth retrying.
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn is_transient_transport(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Prefer the `{"error": {"message"}}` detail, fall back to the raw body.
async fn error_detail(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body)
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// All inputs of one [`embed_batch`](EmbeddingProvider::embed_batch) call are
/// sent in a single request. Transient failures are retried according to the
/// configured [`RetryPolicy`].
///
/// # Example
///
/// ```rust,ignore
/// use brain_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("http://127.0.0.1:11434/v1", "llama2")?;
/// let vectors = provider.embed_batch(&["hello", "world"]).await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    retry: RetryPolicy,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for `{base_url}/embeddings` using `model`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the URL is invalid or the model is empty.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint(base_url, "embeddings")?,
            api_key: None,
            model: require_model(model.into())?,
            retry: RetryPolicy::default(),
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Share an existing HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn provider_error(message: String, retryable: bool) -> RagError {
        RagError::EmbeddingProvider { provider: PROVIDER.to_string(), message, retryable }
    }

    fn shape_error(message: String) -> RagError {
        RagError::EmbeddingShape { provider: PROVIDER.to_string(), message }
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest { model: &self.model, input: texts };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "embedding request failed");
            Self::provider_error(format!("request failed: {e}"), is_transient_transport(&e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response).await;
            error!(provider = PROVIDER, %status, "embedding API error");
            return Err(Self::provider_error(
                format!("API returned {status}: {detail}"),
                is_transient_status(status),
            ));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse embedding response");
            Self::provider_error(format!("failed to parse response: {e}"), false)
        })?;

        let vectors = Self::in_input_order(parsed.data, texts.len())?;
        validate_batch(PROVIDER, texts.len(), &vectors)?;
        Ok(vectors)
    }

    /// Place every item at its `index`, or at its position when absent.
    fn in_input_order(data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(Self::shape_error(format!(
                "expected {expected} embeddings, got {}",
                data.len()
            )));
        }

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
        for (position, item) in data.into_iter().enumerate() {
            let index = item.index.unwrap_or(position);
            let Some(slot) = slots.get_mut(index) else {
                return Err(Self::shape_error(format!(
                    "embedding index {index} out of range for batch of {expected}"
                )));
            };
            if slot.is_some() {
                return Err(Self::shape_error(format!("duplicate embedding index {index}")));
            }
            *slot = Some(item.embedding);
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Self::shape_error("embedding missing from response".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        self.retry.run("embeddings", move || self.request(texts)).await
    }
}

// ── Chat completions ───────────────────────────────────────────────

/// A [`CompletionProvider`] backed by an OpenAI-compatible chat API.
///
/// Every attempt is bounded by a request deadline (30 s by default); an
/// expired deadline fails with [`RagError::CompletionTimeout`] and is not
/// retried.
pub struct OpenAICompletionProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OpenAICompletionProvider {
    /// Create a provider for `{base_url}/chat/completions` using `model`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the URL is invalid or the model is empty.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint(base_url, "chat/completions")?,
            api_key: None,
            model: require_model(model.into())?,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Replace the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Share an existing HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn provider_error(message: String, retryable: bool) -> RagError {
        RagError::CompletionProvider { provider: PROVIDER.to_string(), message, retryable }
    }

    async fn request(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = ChatRequest { model: &self.model, messages };
        let mut request = self.client.post(&self.endpoint).timeout(self.timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "completion request failed");
            if e.is_timeout() {
                RagError::CompletionTimeout {
                    provider: PROVIDER.to_string(),
                    seconds: self.timeout.as_secs(),
                }
            } else {
                Self::provider_error(format!("request failed: {e}"), e.is_connect())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response).await;
            error!(provider = PROVIDER, %status, "completion API error");
            return Err(Self::provider_error(
                format!("API returned {status}: {detail}"),
                is_transient_status(status),
            ));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse completion response");
            if e.is_timeout() {
                RagError::CompletionTimeout {
                    provider: PROVIDER.to_string(),
                    seconds: self.timeout.as_secs(),
                }
            } else {
                Self::provider_error(format!("failed to parse response: {e}"), false)
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                Self::provider_error("response contained no message content".to_string(), false)
            })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletionProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            messages = messages.len(),
            "requesting completion"
        );

        self.retry.run("chat_completion", move || self.request(messages)).await
    }
}
