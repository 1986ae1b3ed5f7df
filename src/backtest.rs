//! Backtest orchestration
//!
//! Fetches price data, asks the code generator for a backtest script and
//! submits both to the execution service (`POST /execute`).

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{NetworkConfig, DEFAULT_EXECUTION_SERVICE_URL};
use crate::normalizers::error_body_text;
use crate::types::*;

/// `result` payload of the execution service.
///
/// The payload is checked against [`BacktestReport`] on decode but kept as
/// received, so serializing it yields exactly what the script printed.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    report: BacktestReport,
    raw: Value,
}

impl BacktestResult {
    /// Validate a raw payload against the report schema
    pub fn from_value(raw: Value) -> serde_json::Result<Self> {
        let report = BacktestReport::deserialize(&raw)?;
        Ok(Self { report, raw })
    }

    /// Typed view of the payload
    pub fn report(&self) -> &BacktestReport {
        &self.report
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

impl Serialize for BacktestResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BacktestResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Self::from_value(raw).map_err(serde::de::Error::custom)
    }
}

/// Schema the script output must follow
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BacktestReport {
    pub data: Vec<BacktestPeriod>,
    pub metrics: BacktestMetrics,
    pub trades: Vec<Map<String, Value>>,
}

/// One period of the strategy/benchmark series
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestPeriod {
    pub date: String,
    #[serde(default)]
    pub strategy_return: Option<f64>,
    #[serde(default)]
    pub benchmark_return: Option<f64>,
    #[serde(default)]
    pub cumulative_strategy: Option<f64>,
    #[serde(default)]
    pub cumulative_benchmark: Option<f64>,
    #[serde(default)]
    pub signal: Option<TradeSignal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSignal {
    Buy,
    Sell,
}

/// Summary statistics; undefined values arrive as null or are left out
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestMetrics {
    #[serde(default)]
    pub sharpe_ratio: Option<f64>,
    #[serde(default)]
    pub annualized_return: Option<f64>,
    #[serde(default)]
    pub max_drawdown: Option<f64>,
    #[serde(default)]
    pub volatility: Option<f64>,
    #[serde(default)]
    pub win_rate: Option<f64>,
    #[serde(default)]
    pub benchmark_name: Option<String>,
    #[serde(default)]
    pub ic: Option<f64>,
}

/// Body of `POST /execute`
#[derive(Debug, Serialize)]
pub struct ExecutionRequest<'a> {
    pub code: &'a str,
    pub data: ExecutionData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionData<'a> {
    pub price_data: &'a [PricePoint],
    pub formula: &'a str,
    pub benchmark: Benchmark,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_threshold: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_threshold: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ExecutionResponse {
    status: String,
    result: Option<Value>,
    error: Option<String>,
    stdout: Option<String>,
}

/// Client for the external script execution service
pub struct ExecutionClient {
    client: Client,
    base_url: String,
}

impl ExecutionClient {
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        Self::with_base_url(DEFAULT_EXECUTION_SERVICE_URL, network)
    }

    pub fn with_base_url(base_url: &str, network: &NetworkConfig) -> Result<Self> {
        Ok(Self {
            client: network.direct_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run a script remotely and decode its result
    pub async fn execute(&self, request: &ExecutionRequest<'_>) -> Result<BacktestResult> {
        let url = format!("{}/execute", self.base_url);

        debug!(
            "Submitting script to {}: {} bytes, {} price points",
            url,
            request.code.len(),
            request.data.price_data.len()
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| LabError::ExecutionHttp {
                message: e.to_string(),
                body: "no response".to_string(),
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = error_body_text(response.text().await);
            return Err(LabError::ExecutionHttp {
                message: format!("request failed with status {}", status),
                body,
            });
        }

        let reply: ExecutionResponse = response.json().await.map_err(|e| {
            LabError::InvalidResponse(format!("execution service response: {}", e))
        })?;

        if reply.status == "error" {
            return Err(LabError::ExecutionFailed {
                error: reply.error.unwrap_or_else(|| "unknown error".to_string()),
                stdout: reply.stdout.unwrap_or_default(),
            });
        }

        let result = reply.result.ok_or_else(|| {
            LabError::InvalidResponse("execution service returned no result".to_string())
        })?;

        BacktestResult::from_value(result)
            .map_err(|e| LabError::InvalidResponse(format!("malformed backtest result: {}", e)))
    }
}

/// Runs a formula against a benchmark end to end
pub struct BacktestRunner {
    market_data: Arc<dyn MarketDataSource>,
    code_generator: Arc<dyn BacktestCodeGenerator>,
    executor: ExecutionClient,
}

impl BacktestRunner {
    pub fn new(
        market_data: Arc<dyn MarketDataSource>,
        code_generator: Arc<dyn BacktestCodeGenerator>,
        executor: ExecutionClient,
    ) -> Self {
        Self {
            market_data,
            code_generator,
            executor,
        }
    }

    /// Price data, then script, then remote execution.
    ///
    /// Any step failure is reported as [`LabError::Backtest`].
    pub async fn run_backtest(
        &self,
        formula: &str,
        benchmark: Benchmark,
        buy_threshold: Option<&str>,
        sell_threshold: Option<&str>,
    ) -> Result<BacktestResult> {
        info!("Running backtest: benchmark={}, formula={}", benchmark, formula);

        match self
            .run_steps(formula, benchmark, buy_threshold, sell_threshold)
            .await
        {
            Ok(result) => {
                info!(
                    "Backtest finished: {} periods, {} trades",
                    result.report().data.len(),
                    result.report().trades.len()
                );
                Ok(result)
            }
            Err(e) => {
                error!("Backtest failed for {}: {}", benchmark, e);
                Err(LabError::Backtest(Box::new(e)))
            }
        }
    }

    async fn run_steps(
        &self,
        formula: &str,
        benchmark: Benchmark,
        buy_threshold: Option<&str>,
        sell_threshold: Option<&str>,
    ) -> Result<BacktestResult> {
        if formula.trim().is_empty() {
            return Err(LabError::InvalidInput("formula must not be empty".to_string()));
        }

        let price_data = self.market_data.get_market_data(benchmark).await?;
        let code = self
            .code_generator
            .generate_backtest_python_code(formula)
            .await?;

        let request = ExecutionRequest {
            code: &code,
            data: ExecutionData {
                price_data: &price_data,
                formula,
                benchmark,
                buy_threshold,
                sell_threshold,
            },
        };

        self.executor.execute(&request).await
    }
}
