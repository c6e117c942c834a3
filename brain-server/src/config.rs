//! Environment-driven server configuration.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use brain_rag::{RagConfig, RagError};
use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set to something that cannot be used.
    #[error("invalid value for {var} ('{value}'): {reason}")]
    Invalid {
        /// The environment variable.
        var: &'static str,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The values parse but do not form a usable pipeline configuration.
    #[error(transparent)]
    Rag(#[from] RagError),
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub completion_base_url: String,
    pub completion_model: String,
    /// Bearer token sent to both OpenAI-compatible endpoints.
    pub provider_api_key: Option<String>,
    pub completion_timeout: Duration,
    pub retry_max_attempts: u32,
    /// Upper bound on request bodies, uploads included.
    pub max_upload_bytes: usize,
    /// Origins allowed by CORS; `*` allows any.
    pub cors_origins: Vec<String>,
    pub log_format: LogFormat,
    pub rag: RagConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            qdrant_url: "http://qdrant:6334".to_string(),
            qdrant_api_key: None,
            embedding_base_url: "http://127.0.0.1:11434/v1".to_string(),
            embedding_model: "llama2".to_string(),
            completion_base_url: "http://host.docker.internal:11434/v1".to_string(),
            completion_model: "llama2".to_string(),
            provider_api_key: None,
            completion_timeout: Duration::from_secs(30),
            retry_max_attempts: 3,
            max_upload_bytes: 25 * 1024 * 1024,
            cors_origins: vec!["http://localhost:3000".to_string()],
            log_format: LogFormat::Pretty,
            rag: RagConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset or blank variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = Self::default();
        let rag_defaults = RagConfig::default();

        let rag = RagConfig::builder()
            .collection(env.string("COLLECTION_NAME", rag_defaults.collection))
            .chunk_size(env.parsed("CHUNK_SIZE", rag_defaults.chunk_size)?)
            .chunk_overlap(env.parsed("CHUNK_OVERLAP", rag_defaults.chunk_overlap)?)
            .top_k(env.parsed("TOP_K", rag_defaults.top_k)?)
            .similarity_threshold(env.optional("SIMILARITY_THRESHOLD")?)
            .build()?;

        let cors_origins = match env.get("CORS_ORIGINS") {
            Some(raw) => parse_origins(&raw)?,
            None => defaults.cors_origins,
        };

        let retry_max_attempts = env.parsed("RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts)?;
        if retry_max_attempts == 0 {
            return Err(invalid("RETRY_MAX_ATTEMPTS", "0", "must be at least 1"));
        }

        Ok(Self {
            bind_addr: env.parsed("BIND_ADDR", defaults.bind_addr)?,
            qdrant_url: env.string("QDRANT_URL", defaults.qdrant_url),
            qdrant_api_key: env.get("QDRANT_API_KEY"),
            embedding_base_url: env.string("EMBEDDING_BASE_URL", defaults.embedding_base_url),
            embedding_model: env.string("EMBEDDING_MODEL", defaults.embedding_model),
            completion_base_url: env.string("COMPLETION_BASE_URL", defaults.completion_base_url),
            completion_model: env.string("COMPLETION_MODEL", defaults.completion_model),
            provider_api_key: env.get("PROVIDER_API_KEY"),
            completion_timeout: Duration::from_secs(
                env.parsed("COMPLETION_TIMEOUT_SECS", defaults.completion_timeout.as_secs())?,
            ),
            retry_max_attempts,
            max_upload_bytes: env.parsed("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            cors_origins,
            log_format: env.parsed("LOG_FORMAT", defaults.log_format)?,
            rag,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn string(&self, var: &str, default: String) -> String {
        self.get(var).unwrap_or(default)
    }

    fn parsed<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.optional(var)?.unwrap_or(default))
    }

    fn optional<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(var)
            .map(|raw| raw.parse::<T>().map_err(|e| invalid(var, &raw, e)))
            .transpose()
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid { var, value: value.to_string(), reason: reason.to_string() }
}

fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| o.trim_end_matches('/').to_string())
        .collect();

    for origin in &origins {
        if origin != "*" {
            HeaderValue::from_str(origin).map_err(|e| invalid("CORS_ORIGINS", origin, e))?;
        }
    }
    Ok(origins)
}
