//! `brain-server` is the HTTP front door of The Brain.
//!
//! It accepts document uploads on `POST /ingest`, answers questions on
//! `POST /query`, and reports liveness on `GET /`. All retrieval work is
//! delegated to [`brain_rag::RagPipeline`].

pub mod config;
pub mod error;
pub mod server;
pub mod telemetry;

pub use config::{ConfigError, LogFormat, ServerConfig};
pub use error::ApiError;
pub use server::{AppState, app_router, build_pipeline, run_server};
pub use telemetry::init_tracing;
