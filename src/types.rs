use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One trading day of price history, as handed to the execution script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub date: NaiveDate,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub open: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub high: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub low: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub close: Decimal,
    pub volume: Option<u64>,
}

/// Supported benchmarks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Benchmark {
    #[serde(rename = "BTC-USD")]
    BtcUsd,
    #[serde(rename = "ETH-USD")]
    EthUsd,
    #[serde(rename = "S&P 500")]
    Sp500,
    #[serde(rename = "CSI 300")]
    Csi300,
}

impl Benchmark {
    pub const ALL: [Benchmark; 4] = [
        Benchmark::BtcUsd,
        Benchmark::EthUsd,
        Benchmark::Sp500,
        Benchmark::Csi300,
    ];

    /// Label used by callers and the execution service
    pub fn label(&self) -> &'static str {
        match self {
            Benchmark::BtcUsd => "BTC-USD",
            Benchmark::EthUsd => "ETH-USD",
            Benchmark::Sp500 => "S&P 500",
            Benchmark::Csi300 => "CSI 300",
        }
    }

    /// Yahoo Finance ticker symbol
    pub fn ticker(&self) -> &'static str {
        match self {
            Benchmark::BtcUsd => "BTC-USD",
            Benchmark::EthUsd => "ETH-USD",
            Benchmark::Sp500 => "^GSPC",
            Benchmark::Csi300 => "000300.SS",
        }
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Benchmark {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self> {
        Benchmark::ALL
            .into_iter()
            .find(|b| b.label() == s)
            .ok_or_else(|| LabError::UnsupportedBenchmark(s.to_string()))
    }
}

/// Factor categories the model is allowed to choose from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorCategory {
    Momentum,
    Value,
    Volatility,
    Quality,
    Sentiment,
    Custom,
}

impl FactorCategory {
    pub const ALL: [FactorCategory; 6] = [
        FactorCategory::Momentum,
        FactorCategory::Value,
        FactorCategory::Volatility,
        FactorCategory::Quality,
        FactorCategory::Sentiment,
        FactorCategory::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactorCategory::Momentum => "Momentum",
            FactorCategory::Value => "Value",
            FactorCategory::Volatility => "Volatility",
            FactorCategory::Quality => "Quality",
            FactorCategory::Sentiment => "Sentiment",
            FactorCategory::Custom => "Custom",
        }
    }
}

/// Web reference attached by the model's grounding metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
}

/// Factor fields as produced by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorSpec {
    pub name: String,
    pub formula: String,
    pub description: String,
    pub intuition: String,
    #[serde(default)]
    pub buy_threshold: Option<String>,
    #[serde(default)]
    pub sell_threshold: Option<String>,
    pub category: FactorCategory,
}

/// A generated alpha factor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlphaFactor {
    pub id: Uuid,
    pub name: String,
    pub formula: String,
    pub description: String,
    pub intuition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_threshold: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_threshold: Option<String>,
    pub category: FactorCategory,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub sources: Vec<Citation>,
}

impl AlphaFactor {
    /// Stamp a model-produced spec with a fresh id and creation time
    pub fn from_spec(spec: FactorSpec, sources: Vec<Citation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: spec.name,
            formula: spec.formula,
            description: spec.description,
            intuition: spec.intuition,
            buy_threshold: spec.buy_threshold,
            sell_threshold: spec.sell_threshold,
            category: spec.category,
            created_at: Utc::now(),
            sources,
        }
    }
}

/// Caller context woven into factor-generation prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default = "default_investment_universe")]
    pub investment_universe: String,
    #[serde(default = "default_time_horizon")]
    pub time_horizon: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            investment_universe: default_investment_universe(),
            time_horizon: default_time_horizon(),
        }
    }
}

fn default_investment_universe() -> String {
    "BTC".to_string()
}

fn default_time_horizon() -> String {
    "1d".to_string()
}

/// Error types for alpha-lab operations
#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error("Unsupported benchmark: {0}")]
    UnsupportedBenchmark(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to fetch market data for {ticker}: {message}")]
    MarketData { ticker: String, message: String },

    #[error("Gemini API error: {0}")]
    Gemini(String),

    #[error("Empty response from Gemini")]
    EmptyResponse,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Python Service HTTP Error: {message} - {body}")]
    ExecutionHttp { message: String, body: String },

    #[error("Python Service Error: {error}\nStdout: {stdout}")]
    ExecutionFailed { error: String, stdout: String },

    #[error("Failed to run backtest: {0}")]
    Backtest(#[source] Box<LabError>),
}

impl LabError {
    /// True for errors caused by the caller's input rather than an upstream,
    /// looking through the backtest wrapper
    pub fn is_client_error(&self) -> bool {
        match self {
            LabError::UnsupportedBenchmark(_) | LabError::InvalidInput(_) => true,
            LabError::Backtest(inner) => inner.is_client_error(),
            _ => false,
        }
    }
}

impl From<config::ConfigError> for LabError {
    fn from(err: config::ConfigError) -> Self {
        LabError::Config(err.to_string())
    }
}

/// Result type for alpha-lab operations
pub type Result<T> = std::result::Result<T, LabError>;

/// Source of daily benchmark price history
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Trailing one-year daily history for a benchmark
    async fn get_market_data(&self, benchmark: Benchmark) -> Result<Vec<PricePoint>>;

    /// Source name
    fn name(&self) -> &str;
}

/// Turns a factor formula into a standalone analysis script
#[async_trait::async_trait]
pub trait BacktestCodeGenerator: Send + Sync {
    async fn generate_backtest_python_code(&self, formula: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_benchmark_tickers() {
        let tickers: Vec<_> = Benchmark::ALL.iter().map(|b| b.ticker()).collect();
        assert_eq!(tickers, vec!["BTC-USD", "ETH-USD", "^GSPC", "000300.SS"]);
    }

    #[test]
    fn test_benchmark_parse_roundtrip() {
        for benchmark in Benchmark::ALL {
            let parsed: Benchmark = benchmark.label().parse().unwrap();
            assert_eq!(parsed, benchmark);
            assert_eq!(parsed.to_string(), benchmark.label());
        }
    }

    #[test]
    fn test_unsupported_benchmark() {
        let err = "UNKNOWN".parse::<Benchmark>().unwrap_err();
        assert!(matches!(err, LabError::UnsupportedBenchmark(ref s) if s == "UNKNOWN"));
        assert_eq!(err.to_string(), "Unsupported benchmark: UNKNOWN");
        assert!(err.is_client_error());

        // Labels are exact
        assert!("s&p 500".parse::<Benchmark>().is_err());
    }

    #[test]
    fn test_benchmark_serializes_as_label() {
        let json = serde_json::to_string(&Benchmark::Sp500).unwrap();
        assert_eq!(json, "\"S&P 500\"");
    }

    #[test]
    fn test_price_point_wire_format() {
        let point = PricePoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: Some(dec("100.5")),
            high: None,
            low: Some(dec("99")),
            close: dec("101.25"),
            volume: Some(1200),
        };

        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["date"], "2024-01-02");
        assert_eq!(value["open"], 100.5);
        assert!(value["high"].is_null());
        assert_eq!(value["close"], 101.25);
        assert_eq!(value["volume"], 1200);
    }

    #[test]
    fn test_alpha_factor_serialization() {
        let spec = FactorSpec {
            name: "VolAdjusted_RSI".to_string(),
            formula: "ta.rsi(df['close'], length=14)".to_string(),
            description: "RSI scaled by volume".to_string(),
            intuition: "Momentum with participation".to_string(),
            buy_threshold: Some("70".to_string()),
            sell_threshold: None,
            category: FactorCategory::Momentum,
        };
        let factor = AlphaFactor::from_spec(spec, vec![]);

        let value = serde_json::to_value(&factor).unwrap();
        assert_eq!(value["buyThreshold"], "70");
        assert!(value.get("sellThreshold").is_none());
        assert_eq!(value["category"], "Momentum");
        assert!(value["createdAt"].is_i64());
        assert_eq!(value["sources"], serde_json::json!([]));
        assert!(!value["id"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_generation_config_defaults() {
        let config: GenerationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GenerationConfig::default());

        let config: GenerationConfig =
            serde_json::from_str(r#"{"investmentUniverse":"ETH","timeHorizon":"1w"}"#).unwrap();
        assert_eq!(config.investment_universe, "ETH");
        assert_eq!(config.time_horizon, "1w");
    }

    #[test]
    fn test_backtest_error_wraps_inner_message() {
        let err = LabError::Backtest(Box::new(LabError::ExecutionFailed {
            error: "bad formula".to_string(),
            stdout: "trace".to_string(),
        }));
        let message = err.to_string();
        assert!(message.starts_with("Failed to run backtest: Python Service Error: bad formula"));
        assert!(message.contains("Stdout: trace"));
        assert!(!err.is_client_error());

        let wrapped_input = LabError::Backtest(Box::new(LabError::InvalidInput("x".to_string())));
        assert!(wrapped_input.is_client_error());
    }
}
