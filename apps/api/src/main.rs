mod assets;
mod compose;
mod config;
mod errors;
mod models;
mod render;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::assets::HttpAssetLoader;
use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Estimate API v{}", env!("CARGO_PKG_VERSION"));

    // One pooled HTTP client shared by every render's asset fetches
    let loader = HttpAssetLoader::new(config.asset_fetch_timeout(), config.asset_max_bytes)?;
    info!(
        "Asset loader initialized (timeout: {}s, max: {} bytes)",
        config.asset_fetch_timeout_secs, config.asset_max_bytes
    );

    let state = AppState {
        config: config.clone(),
        assets: Arc::new(loader),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
