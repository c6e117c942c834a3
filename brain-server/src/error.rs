//! HTTP error mapping.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use brain_rag::RagError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by request handlers.
///
/// Rendered as `{"detail": "<message>"}` with a status derived from the
/// failure class.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request itself is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The request body exceeds the configured limit.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// The pipeline failed.
    #[error(transparent)]
    Rag(#[from] RagError),
}

impl ApiError {
    /// The HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Rag(e) => match e {
                RagError::Extraction { .. } | RagError::Decode(_) => StatusCode::BAD_REQUEST,
                RagError::NoContextFound => StatusCode::NOT_FOUND,
                RagError::DimensionMismatch { .. } | RagError::SchemaMismatch { .. } => {
                    StatusCode::CONFLICT
                }
                RagError::EmbeddingProvider { .. }
                | RagError::EmbeddingShape { .. }
                | RagError::CompletionProvider { .. } => StatusCode::BAD_GATEWAY,
                RagError::CompletionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                RagError::VectorStore { .. } => StatusCode::SERVICE_UNAVAILABLE,
                RagError::InvalidChunkConfig { .. } | RagError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(e.body_text())
        } else {
            Self::BadRequest(e.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %detail, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %detail, "request rejected");
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_failure_class() {
        let cases = [
            (RagError::Decode("bad utf-8".into()), StatusCode::BAD_REQUEST),
            (RagError::NoContextFound, StatusCode::NOT_FOUND),
            (
                RagError::CompletionTimeout { provider: "openai".into(), seconds: 30 },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                RagError::EmbeddingShape { provider: "openai".into(), message: "short".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (
                RagError::DimensionMismatch { collection: "c".into(), expected: 2, actual: 3 },
                StatusCode::CONFLICT,
            ),
            (
                RagError::VectorStore { backend: "qdrant".into(), message: "down".into() },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (RagError::Config("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_detail_is_human_readable() {
        let error = ApiError::from(RagError::NoContextFound);
        assert_eq!(error.to_string(), "No relevant context found");
    }
}
