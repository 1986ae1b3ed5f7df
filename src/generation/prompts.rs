//! Prompt text and response schemas for factor generation.

use serde_json::{json, Value};

use crate::types::{FactorCategory, GenerationConfig};

/// Vocabulary the bulk prompt draws strategy combinations from
pub const INDICATORS: &[&str] = &[
    "MA", "SMA", "EMA", "MACD", "RSI", "Bollinger Bands", "KDJ", "Stochastic Oscillator", "CCI",
    "ATR", "OBV", "Ichimoku Cloud", "Parabolic SAR", "ADX", "MFI", "Williams %R", "VWAP", "DMI",
    "ROC", "Aroon Indicator",
];

pub const SIGNAL_TYPES: &[&str] = &[
    "Golden Cross", "Death Cross", "Crossover", "Divergence", "Hidden Divergence",
    "Trend Reversal", "Overbought", "Oversold", "Breakout", "False Breakout", "Squeeze",
    "Expansion", "Zero Line Cross", "Midline Cross", "Histogram Flip", "Histogram Shrink",
    "Failure Swing", "Trendline Break", "Riding", "Slope",
];

pub const CONDITIONS: &[&str] = &[
    "Upper Band", "Lower Band", "Mid Band", "Bandwidth", "Signal Line", "MACD Line", "Histogram",
    "Threshold 70/30", "Midline 50", "Volume Spike", "Volume Shrink", "Multi-Timeframe",
    "Synchronous Signal", "Momentum Wane", "Trend Accelerate", "Support Bounce",
    "Resistance Reject", "Alignment", "Multiple Cross", "Time-Serial", "Cross-Sectional",
    "D Days", "Abs", "Log", "Sign", "Power", "Mean_Volume", "High-Low", "Open-Close",
    "Prev_Close", "Turnover",
];

pub const COMPOSITE_TERMS: &[&str] = &[
    "Composite Factor", "Combine with...", "Confirmation Signal", "Bullish", "Bearish",
    "Long Trend", "Short Trend", "Range Strategy", "Trend Continuation", "Reversal Point",
    "Buy Signal", "Sell Signal", "Filter", "Confluence", "When...and...", "New High/Low",
];

/// Prompt for a single factor built around a free-text idea
pub fn single_factor_prompt(idea: &str, config: &GenerationConfig) -> String {
    format!(
        "Acting as a Senior Quant for BTC markets, generate a sophisticated alpha factor for: \"{idea}\".\n\
         Universe: {universe}. Target: {horizon}.\n\
         Incorporate real-time market regime knowledge. The formula must be a valid one-line Pandas/Numpy expression.\n\
         Also provide recommended buy and sell threshold values based on the factor's characteristics.",
        idea = idea,
        universe = config.investment_universe,
        horizon = config.time_horizon,
    )
}

/// Prompt for `count` diverse factors drawn from the fixed vocabulary
pub fn bulk_factor_prompt(count: usize, config: &GenerationConfig) -> String {
    format!(
        r#"# Role
  Chief Quantitative Strategist

# Context
  Universe: {universe}. Target horizon: {horizon}.

# Word list
  - Indicators
    {indicators}
  - Signal Types
    {signals}
  - Conditions & Thresholds
    {conditions}
  - Composite & Strategy Terms
    {composites}

# Task 1: Concept Selection
  Select {count} unique combinations of concepts from the word list. Ensure diversity in strategy types (Momentum, Mean Reversion, Volatility, etc.).

# Task 2: Factor Generation
  For each combination, generate a sophisticated alpha factor tailored for the BTC/Crypto market.
  - **Context**: The crypto market trades 24/7 with high volatility and regime shifts. Factors should be robust to noise.
  - **Formula**: The formula MUST be a valid Python expression using `pandas` (as pd) and `pandas_ta` (as ta).
    - Example: `ta.rsi(df['close'], length=14) / ta.sma(df['volume'], length=20)`
    - Assume `df` contains 'open', 'high', 'low', 'close', 'volume'.
  - **Naming**: Give each factor a unique, professional name (e.g. "VolAdjusted_RSI_Momentum").
  - **Intuition**: Provide a clear economic or market microstructure intuition for why it should work.

# Task 3: Optimization & Thresholds
  - Use your knowledge of recent market behaviour to suggest buy/sell thresholds.
  - Avoid look-ahead bias: never use future data.

# Core Requirements
  - **High Information Coefficient (IC)**: target predictive power for next-period returns.
  - **Actionability**: avoid overly complex formulas that are hard to execute or prone to overfitting.
  - **Syntax Accuracy**: every formula must be valid for `pandas` and `pandas_ta`.
  - Return exactly {count} factors.
"#,
        universe = config.investment_universe,
        horizon = config.time_horizon,
        indicators = INDICATORS.join(", "),
        signals = SIGNAL_TYPES.join(", "),
        conditions = CONDITIONS.join(", "),
        composites = COMPOSITE_TERMS.join(", "),
        count = count,
    )
}

/// Prompt asking for a standalone backtest script for `formula`
pub fn backtest_code_prompt(formula: &str) -> String {
    format!(
        r#"You are an expert Python developer and Quantitative Analyst.
Generate a standalone, executable Python script that backtests a trading strategy built on the formula below and calculates its Information Coefficient (IC).

Formula: "{formula}"

Requirements:
1. **Imports**: import ONLY `pandas`, `pandas_ta` (as `ta`), `numpy` (as `np`), `json` and `sys`.
2. **Input**: read the input with `json.load(sys.stdin)`. It contains `priceData`, a list of objects with keys `date`, `open`, `high`, `low`, `close`, `volume`. It may also contain `buyThreshold` and `sellThreshold` (strings holding numbers) and `formula`, `benchmark`.
3. **Data Processing**:
   * Convert `priceData` to a pandas DataFrame `df`.
   * Convert the `date` column to datetime and sort by date.
4. **Factor Calculation**:
   * Evaluate the formula with `df` holding columns 'open', 'high', 'low', 'close', 'volume'.
   * Use `pandas_ta` (as `ta`) for any technical indicator the formula needs.
   * Store the result in a column named `factor`.
   * Handle numerical problems gracefully, e.g. `replace([np.inf, -np.inf], np.nan)` and `fillna(0)`.
5. **IC Calculation**:
   * `df['next_return'] = df['close'].shift(-1) / df['close'] - 1`
   * IC is the Spearman rank correlation of `factor` against `next_return`: `df['factor'].corr(df['next_return'], method='spearman')`, computed after dropping NaN rows.
6. **Backtest Simulation**:
   * BUY when the factor is above the buy threshold, SELL when it is below the sell threshold. Use `buyThreshold`/`sellThreshold` from the input when present and numeric; otherwise use the 80th/20th percentiles of the factor.
   * Go long after BUY and short after SELL; compute `strategyReturn` from the position held over the next period.
   * Compute `cumulativeStrategy` and `cumulativeBenchmark` (buy and hold).
   * Record every position change as a trade.
   * Compute `sharpeRatio`, `annualizedReturn`, `maxDrawdown`, `volatility` and `winRate`.
7. **Output**: print to stdout ONE JSON object with:
   * `data`: list of records with `date` (YYYY-MM-DD string), `strategyReturn`, `benchmarkReturn`, `cumulativeStrategy`, `cumulativeBenchmark`, `signal` ('BUY', 'SELL' or null).
   * `metrics`: object with `sharpeRatio`, `annualizedReturn`, `maxDrawdown`, `volatility`, `winRate`, `benchmarkName` (use "Benchmark") and `ic`.
   * `trades`: list of trade objects.
   * Replace NaN and infinite values with null so the output is valid JSON.
8. **Error Handling**: wrap the main logic in try/except. On failure print a JSON object with an `error` key to stdout instead of raising.
9. **Constraint**: do NOT output markdown formatting (like ```python). Output ONLY the raw Python code.
"#,
        formula = formula,
    )
}

/// Response schema for one factor object
pub fn factor_schema() -> Value {
    let categories: Vec<&str> = FactorCategory::ALL.iter().map(|c| c.as_str()).collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "formula": { "type": "STRING" },
            "description": { "type": "STRING" },
            "intuition": { "type": "STRING" },
            "buyThreshold": { "type": "STRING" },
            "sellThreshold": { "type": "STRING" },
            "category": { "type": "STRING", "enum": categories },
        },
        "required": ["name", "formula", "description", "intuition", "category"],
    })
}

/// Response schema for a list of factor objects
pub fn factor_list_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": factor_schema(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_prompt_includes_context() {
        let config = GenerationConfig {
            investment_universe: "ETH".to_string(),
            time_horizon: "4h".to_string(),
        };
        let prompt = single_factor_prompt("volume breakout", &config);

        assert!(prompt.contains("\"volume breakout\""));
        assert!(prompt.contains("Universe: ETH. Target: 4h."));
    }

    #[test]
    fn test_bulk_prompt_embeds_vocabulary_and_count() {
        let prompt = bulk_factor_prompt(7, &GenerationConfig::default());

        assert!(prompt.contains("Select 7 unique combinations"));
        assert!(prompt.contains("Return exactly 7 factors"));
        for term in INDICATORS.iter().chain(SIGNAL_TYPES).chain(CONDITIONS).chain(COMPOSITE_TERMS) {
            assert!(prompt.contains(term), "missing term {}", term);
        }
    }

    #[test]
    fn test_code_prompt_embeds_formula() {
        let prompt = backtest_code_prompt("ta.rsi(df['close'], length=14)");
        assert!(prompt.contains("Formula: \"ta.rsi(df['close'], length=14)\""));
        assert!(prompt.contains("buyThreshold"));
    }

    #[test]
    fn test_factor_schema_requires_category() {
        let schema = factor_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();

        assert!(required.contains(&"category"));
        assert!(!required.contains(&"buyThreshold"));
        assert_eq!(schema["properties"]["category"]["enum"].as_array().unwrap().len(), 6);
        assert_eq!(factor_list_schema()["items"], schema);
    }
}
