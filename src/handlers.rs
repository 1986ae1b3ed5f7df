use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::backtest::BacktestResult;
use crate::types::*;
use crate::AppState;

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Map a domain error to an HTTP status and JSON body
fn reject(err: LabError) -> (StatusCode, Json<ErrorResponse>) {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    };

    warn!("Request failed ({}): {}", status, err);

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /benchmarks - Supported benchmark labels and their tickers
pub async fn list_benchmarks() -> Json<Vec<BenchmarkInfo>> {
    Json(
        Benchmark::ALL
            .iter()
            .map(|b| BenchmarkInfo {
                label: b.label(),
                ticker: b.ticker(),
            })
            .collect(),
    )
}

/// GET /market-data/{benchmark} - One year of daily prices
pub async fn get_market_data(
    State(state): State<Arc<AppState>>,
    Path(label): Path<String>,
) -> ApiResult<Vec<PricePoint>> {
    let benchmark: Benchmark = label.parse().map_err(reject)?;

    state
        .market_data
        .get_market_data(benchmark)
        .await
        .map(Json)
        .map_err(reject)
}

/// POST /factors/generate - One factor from a free-text idea
pub async fn generate_factor(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateFactorRequest>,
) -> ApiResult<AlphaFactor> {
    if req.prompt.trim().is_empty() {
        return Err(reject(LabError::InvalidInput("prompt must not be empty".to_string())));
    }

    state
        .generator
        .generate_alpha_factor(&req.prompt, &req.config)
        .await
        .map(Json)
        .map_err(reject)
}

/// POST /factors/bulk - A batch of diverse factors
pub async fn generate_bulk_factors(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkFactorRequest>,
) -> ApiResult<Vec<AlphaFactor>> {
    state
        .generator
        .generate_bulk_alpha_factors(req.count, &req.config)
        .await
        .map(Json)
        .map_err(reject)
}

/// POST /factors/code - Backtest script for a formula
pub async fn generate_code(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CodeRequest>,
) -> ApiResult<CodeResponse> {
    if req.formula.trim().is_empty() {
        return Err(reject(LabError::InvalidInput("formula must not be empty".to_string())));
    }

    state
        .generator
        .generate_backtest_python_code(&req.formula)
        .await
        .map(|code| Json(CodeResponse { code }))
        .map_err(reject)
}

/// POST /backtest - Run a formula against a benchmark
pub async fn run_backtest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BacktestRequest>,
) -> ApiResult<BacktestResult> {
    let benchmark: Benchmark = req.benchmark.parse().map_err(reject)?;

    info!("Backtest requested for {}", benchmark);

    state
        .runner
        .run_backtest(
            &req.formula,
            benchmark,
            req.buy_threshold.as_deref(),
            req.sell_threshold.as_deref(),
        )
        .await
        .map(Json)
        .map_err(reject)
}

// Request types
#[derive(Debug, serde::Deserialize)]
pub struct GenerateFactorRequest {
    pub prompt: String,
    #[serde(default)]
    pub config: GenerationConfig,
}

#[derive(Debug, serde::Deserialize)]
pub struct BulkFactorRequest {
    pub count: usize,
    #[serde(default)]
    pub config: GenerationConfig,
}

#[derive(Debug, serde::Deserialize)]
pub struct CodeRequest {
    pub formula: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    pub formula: String,
    pub benchmark: String,
    #[serde(default)]
    pub buy_threshold: Option<String>,
    #[serde(default)]
    pub sell_threshold: Option<String>,
}

// Response types
#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, serde::Serialize)]
pub struct BenchmarkInfo {
    pub label: &'static str,
    pub ticker: &'static str,
}

#[derive(Debug, serde::Serialize)]
pub struct CodeResponse {
    pub code: String,
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
