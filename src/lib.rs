pub mod types;
pub mod config;
pub mod sources {
    pub mod yahoo;
}
pub mod generation {
    pub mod gemini;
    pub mod prompts;
}
pub mod normalizers;
pub mod backtest;
pub mod handlers;

pub use types::*;
pub use config::{AppConfig, NetworkConfig};
pub use sources::yahoo::YahooFinanceClient;
pub use generation::gemini::GeminiClient;
pub use backtest::{BacktestReport, BacktestResult, BacktestRunner, ExecutionClient};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
pub struct AppState {
    pub market_data: Arc<dyn MarketDataSource>,
    pub generator: Arc<GeminiClient>,
    pub runner: BacktestRunner,
}

impl AppState {
    /// Wire the three adapters together
    pub fn new(
        market_data: Arc<dyn MarketDataSource>,
        generator: Arc<GeminiClient>,
        executor: ExecutionClient,
    ) -> Self {
        let runner = BacktestRunner::new(market_data.clone(), generator.clone(), executor);
        Self {
            market_data,
            generator,
            runner,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let network = config.network();

        let market_data = YahooFinanceClient::with_base_url(&config.yahoo_base_url, &network)?;
        let generator = GeminiClient::from_config(config)?;
        let executor = ExecutionClient::with_base_url(&config.execution_service_url, &network)?;

        Ok(Self::new(Arc::new(market_data), Arc::new(generator), executor))
    }
}

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/benchmarks", get(handlers::list_benchmarks))
        .route("/market-data/{benchmark}", get(handlers::get_market_data))
        .route("/factors/generate", post(handlers::generate_factor))
        .route("/factors/bulk", post(handlers::generate_bulk_factors))
        .route("/factors/code", post(handlers::generate_code))
        .route("/backtest", post(handlers::run_backtest))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
