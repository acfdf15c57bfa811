//! Quibble Commerce - order lifecycle service

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quibble_commerce::api;
use quibble_commerce::config::AppConfig;
use quibble_commerce::state::{AppState, Backends};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    let registry = tracing_subscriber::registry().with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));
    if config.json_logs { registry.with(fmt::layer().json()).init() } else { registry.with(fmt::layer()).init() }

    let backends = Backends::from_config(&config).await?;
    let port = config.port;
    let state = AppState::new(config, backends);

    let app = api::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "Quibble Commerce listening");
    axum::serve(listener, app).await?;
    Ok(())
}
