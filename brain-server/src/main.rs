use anyhow::Context;
use brain_server::{ServerConfig, init_tracing, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments set the environment directly.
    let dotenv = dotenvy::dotenv();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format)?;

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to load .env"),
    }

    run_server(config).await
}
