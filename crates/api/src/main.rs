use anyhow::Context;

use f1api_api::config::{AppConfig, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    f1api_observability::init(&config.server.mode);
    tracing::debug!(?config, "configuration loaded");

    let app = f1api_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    tracing::info!(addr = %listener.local_addr()?, base_path = config.base_path(), "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
