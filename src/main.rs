use std::sync::Arc;
use tracing::{info, Level};

use alpha_lab::{AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    // Optional .env for local runs
    dotenvy::dotenv().ok();

    info!("Starting alpha-lab...");

    let config = AppConfig::from_env()?;
    match &config.outbound_proxy_url {
        Some(proxy) => info!("✓ Provider calls routed through {}", proxy),
        None => info!("✓ Provider calls go direct"),
    }

    let state = Arc::new(AppState::from_config(&config)?);
    info!(
        "✓ Clients initialized: model={}, execution service={}",
        state.generator.model(),
        config.execution_service_url
    );

    let app = alpha_lab::router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("🚀 alpha-lab listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
