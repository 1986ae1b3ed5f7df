//! Fixtures shared by the integration tests

#![allow(dead_code)]

use serde_json::{json, Value};

pub const API_KEY: &str = "test-key";
pub const MODEL: &str = "gemini-test";

/// 2024-01-01 .. 2024-01-04, 00:00 UTC
pub const TIMESTAMPS: [i64; 4] = [1_704_067_200, 1_704_153_600, 1_704_240_000, 1_704_326_400];

/// Yahoo chart payload with one quote missing its close
pub fn yahoo_chart() -> Value {
    json!({
        "chart": {
            "result": [{
                "meta": {"currency": "USD", "symbol": "^GSPC"},
                "timestamp": TIMESTAMPS,
                "indicators": {
                    "quote": [{
                        "open":   [4742.83, 4745.20, 4725.07, 4697.42],
                        "high":   [4754.33, 4754.33, 4729.29, 4726.78],
                        "low":    [4722.67, 4722.67, 4699.71, 4687.53],
                        "close":  [4742.83, null, 4704.81, 4688.68],
                        "volume": [3743050000u64, 3743050000u64, 3950760000u64, 3715480000u64]
                    }]
                }
            }],
            "error": null
        }
    })
}

pub fn yahoo_not_found() -> Value {
    json!({
        "chart": {
            "result": null,
            "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
        }
    })
}

/// Gemini reply whose first candidate carries `text`
pub fn gemini_text(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

/// Gemini reply with `text` and two grounding chunks, one without a title
pub fn gemini_grounded(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "groundingMetadata": {
                "groundingChunks": [
                    {"web": {"uri": "https://example.com/funding", "title": "Funding rates"}},
                    {"web": {"uri": "https://example.com/vol"}}
                ]
            }
        }]
    })
}

pub fn factor_json(name: &str, category: &str) -> Value {
    json!({
        "name": name,
        "formula": "ta.rsi(df['close'], length=14) / ta.sma(df['volume'], length=20)",
        "description": "RSI normalised by average volume",
        "intuition": "Momentum confirmed by participation",
        "buyThreshold": "0.8",
        "sellThreshold": "0.2",
        "category": category
    })
}

pub fn backtest_result() -> Value {
    json!({
        "data": [
            {
                "date": "2024-01-01",
                "strategyReturn": 0.0,
                "benchmarkReturn": 0.0,
                "cumulativeStrategy": 1.0,
                "cumulativeBenchmark": 1.0,
                "signal": null
            },
            {
                "date": "2024-01-03",
                "strategyReturn": 0.0125,
                "benchmarkReturn": -0.0081,
                "cumulativeStrategy": 1.0125,
                "cumulativeBenchmark": 0.9919,
                "signal": "BUY"
            }
        ],
        "metrics": {
            "sharpeRatio": 1.37,
            "annualizedReturn": 0.214,
            "maxDrawdown": -0.093,
            "volatility": 0.187,
            "winRate": 0.56,
            "benchmarkName": "Benchmark",
            "ic": 0.043
        },
        "trades": [
            {"date": "2024-01-03", "type": "BUY", "price": 4704.81}
        ]
    })
}
