use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::{NetworkConfig, DEFAULT_YAHOO_BASE_URL};
use crate::normalizers::{normalize_quotes, RawQuote};
use crate::types::*;

/// Yahoo rejects requests without a browser-like user agent
const USER_AGENT: &str = "Mozilla/5.0 (compatible; alpha-lab/0.1)";

/// Length of the history window
const HISTORY_DAYS: i64 = 365;

/// Yahoo Finance chart API client
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
}

impl YahooFinanceClient {
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        Self::with_base_url(DEFAULT_YAHOO_BASE_URL, network)
    }

    /// Create client with a specific API root (for testing)
    pub fn with_base_url(base_url: &str, network: &NetworkConfig) -> Result<Self> {
        let client = network
            .proxied_builder()?
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LabError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Trailing year ending at the start of the current UTC day.
    ///
    /// The end is truncated to midnight so repeated calls within a day
    /// request the same window.
    pub fn history_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
        let start = end - Duration::days(HISTORY_DAYS);
        (start, end)
    }

    /// Daily price history for one ticker over the trailing year
    pub async fn fetch_history(&self, ticker: &str) -> Result<Vec<PricePoint>> {
        let (start, end) = Self::history_window(Utc::now());
        let quotes = self.get_chart(ticker, start, end).await?;
        Ok(normalize_quotes(quotes))
    }

    /// Raw daily quotes from `/v8/finance/chart/{ticker}`
    pub async fn get_chart(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawQuote>> {
        let fail = |message: String| LabError::MarketData {
            ticker: ticker.to_string(),
            message,
        };

        let encoded: String = url::form_urlencoded::byte_serialize(ticker.as_bytes()).collect();
        let url = format!("{}/v8/finance/chart/{}", self.base_url, encoded);

        debug!("Requesting chart {} from {} to {}", url, start, end);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", start.timestamp().to_string()),
                ("period2", end.timestamp().to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| fail(e.to_string()))?;

        // Yahoo reports errors as a JSON body alongside a non-2xx status
        let chart: ChartResponse = match serde_json::from_str(&body) {
            Ok(chart) => chart,
            Err(e) if status.is_success() => {
                return Err(fail(format!("Invalid chart response: {}", e)));
            }
            Err(_) => return Err(fail(format!("Yahoo Finance API error ({}): {}", status, body))),
        };

        if let Some(err) = chart.chart.error {
            return Err(fail(format!("{}: {}", err.code, err.description)));
        }

        if !status.is_success() {
            return Err(fail(format!("Yahoo Finance API error ({})", status)));
        }

        let result = chart
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| fail(format!("No data returned for {}", ticker)))?;

        let quotes = result.into_quotes();
        if quotes.is_empty() {
            return Err(fail(format!("No data returned for {}", ticker)));
        }

        Ok(quotes)
    }
}

#[async_trait::async_trait]
impl MarketDataSource for YahooFinanceClient {
    async fn get_market_data(&self, benchmark: Benchmark) -> Result<Vec<PricePoint>> {
        let ticker = benchmark.ticker();
        info!("Fetching market data for {} ({})", benchmark, ticker);

        match self.fetch_history(ticker).await {
            Ok(points) => {
                info!("Fetched {} price points for {}", points.len(), ticker);
                Ok(points)
            }
            Err(e) => {
                error!("Yahoo Finance fetch failed for {}: {}", ticker, e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "yahoo_finance"
    }
}

// Response types for the Yahoo chart API
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<Option<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

impl ChartResult {
    /// Zip the column-oriented series into one record per timestamp
    fn into_quotes(self) -> Vec<RawQuote> {
        let series = self.indicators.quote.into_iter().next().unwrap_or_default();
        let at = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();

        self.timestamp
            .iter()
            .enumerate()
            .map(|(i, timestamp)| RawQuote {
                timestamp: *timestamp,
                open: at(&series.open, i),
                high: at(&series.high, i),
                low: at(&series.low, i),
                close: at(&series.close, i),
                volume: series.volume.get(i).copied().flatten(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_history_window_truncates_to_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 17, 42, 9).unwrap();
        let (start, end) = YahooFinanceClient::history_window(now);

        assert_eq!(end, Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2023, 6, 16, 0, 0, 0).unwrap());
        assert_eq!((end - start).num_days(), 365);
    }

    #[test]
    fn test_history_window_is_stable_within_a_day() {
        let morning = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 1).unwrap();
        let night = Utc.with_ymd_and_hms(2024, 6, 15, 23, 59, 59).unwrap();
        assert_eq!(
            YahooFinanceClient::history_window(morning),
            YahooFinanceClient::history_window(night)
        );
    }

    #[test]
    fn test_into_quotes_zips_columns() {
        let result: ChartResult = serde_json::from_value(serde_json::json!({
            "timestamp": [1704067200, 1704153600],
            "indicators": {
                "quote": [{
                    "open": [1.0, null],
                    "high": [2.0, 2.5],
                    "low": [0.5, 0.7],
                    "close": [1.5],
                    "volume": [100, 200]
                }]
            }
        }))
        .unwrap();

        let quotes = result.into_quotes();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].close, Some(1.5));
        assert_eq!(quotes[1].open, None);
        // Short column reads as missing
        assert_eq!(quotes[1].close, None);
        assert_eq!(quotes[1].volume, Some(200));
    }

    #[test]
    fn test_client_trims_base_url() {
        let client =
            YahooFinanceClient::with_base_url("http://localhost:9999/", &NetworkConfig::direct())
                .unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
        assert_eq!(client.name(), "yahoo_finance");
    }
}
