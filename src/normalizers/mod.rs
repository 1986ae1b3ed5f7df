// Normalization of provider payloads into the shapes the rest of the crate uses
use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use tracing::debug;

use crate::types::PricePoint;

/// One quote record as reported by the market-data provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQuote {
    /// Unix seconds
    pub timestamp: Option<i64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

/// Convert provider quotes to price points, keeping provider order.
///
/// A record is kept iff it has both a timestamp and a usable close.
pub fn normalize_quotes(quotes: Vec<RawQuote>) -> Vec<PricePoint> {
    let total = quotes.len();

    let points: Vec<PricePoint> = quotes.into_iter().filter_map(normalize_quote).collect();

    if points.len() < total {
        debug!(
            "Dropped {} of {} quotes missing a date or close",
            total - points.len(),
            total
        );
    }

    points
}

fn normalize_quote(quote: RawQuote) -> Option<PricePoint> {
    let date = quote_date(quote.timestamp?)?;
    let close = to_decimal(quote.close)?;

    Some(PricePoint {
        date,
        open: to_decimal(quote.open),
        high: to_decimal(quote.high),
        low: to_decimal(quote.low),
        close,
        volume: quote.volume,
    })
}

/// Calendar day (UTC) of a Unix timestamp
fn quote_date(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

fn to_decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(|v| Decimal::try_from(v).ok())
}

/// Remove markdown code fences the model may wrap a script in.
///
/// Strips a leading fence (with an optional language tag on its line) and a
/// trailing fence, then trims. Idempotent.
pub fn strip_code_fences(text: &str) -> String {
    let mut current = text.trim();

    loop {
        let mut next = current;

        if let Some(rest) = next.strip_prefix("```") {
            next = match rest.split_once('\n') {
                Some((tag, body)) if is_language_tag(tag) => body,
                _ if is_language_tag(rest) => "",
                _ => rest,
            };
        }

        if let Some(rest) = next.trim_end().strip_suffix("```") {
            next = rest;
        }

        let next = next.trim();
        if next == current {
            return current.to_string();
        }
        current = next;
    }
}

fn is_language_tag(tag: &str) -> bool {
    tag.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '.'))
}

/// Body of an error response for inclusion in a message; a failed read is
/// reported in place of the body.
pub fn error_body_text(body: reqwest::Result<String>) -> String {
    body.unwrap_or_else(|e| format!("<unreadable response body: {}>", e))
}
