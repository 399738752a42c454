//! Per-stock feature vectors and the feature table schema

use crate::error::{FeatureError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Columns the clustering consumer requires in every feature table
pub const REQUIRED_FEATURE_COLUMNS: [&str; 15] = [
    "std_return",
    "volatility_mean",
    "volatility_max",
    "max_drawdown",
    "downside_deviation",
    "var_95",
    "sharpe_ratio",
    "return_skew",
    "return_kurtosis",
    "rsi_mean",
    "bb_width_mean",
    "momentum_30d",
    "momentum_90d",
    "trading_frequency",
    "amihud_illiquidity",
];

/// Identity columns, in output order
pub const IDENTITY_COLUMNS: [&str; 3] = ["stock_code", "sector", "name"];

/// Numeric columns always present, in output order
pub const FEATURE_COLUMNS: [&str; 23] = [
    "volatility_mean",
    "volatility_max",
    "downside_deviation",
    "var_95",
    "max_drawdown",
    "mean_return",
    "std_return",
    "return_skew",
    "return_kurtosis",
    "sharpe_ratio",
    "rsi_mean",
    "bb_width_mean",
    "macd_volatility",
    "avg_volume",
    "volume_volatility",
    "amihud_illiquidity",
    "trading_frequency",
    "momentum_30d",
    "momentum_90d",
    "trend_strength",
    "avg_recovery_days",
    "return_consistency",
    "current_price",
];

/// Columns only written when the producing option is enabled
pub const OPTIONAL_FEATURE_COLUMNS: [&str; 2] = ["avg_recovery_days", "return_consistency"];

/// One stock's aggregated risk/return profile
///
/// `None` marks a statistic that is undefined for this history (for example
/// `momentum_90d` on a 40-day series). Filling those is left to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockFeatureVector {
    pub stock_code: String,
    pub sector: Option<String>,
    pub name: Option<String>,

    // Risk
    pub volatility_mean: Option<f64>,
    pub volatility_max: Option<f64>,
    pub downside_deviation: Option<f64>,
    pub var_95: Option<f64>,
    pub max_drawdown: Option<f64>,

    // Return distribution over active days
    pub mean_return: Option<f64>,
    pub std_return: Option<f64>,
    pub return_skew: Option<f64>,
    pub return_kurtosis: Option<f64>,
    /// Always within the configured clamp bound
    pub sharpe_ratio: Option<f64>,

    // Technical
    pub rsi_mean: Option<f64>,
    pub bb_width_mean: Option<f64>,
    pub macd_volatility: Option<f64>,

    // Liquidity
    pub avg_volume: Option<f64>,
    pub volume_volatility: Option<f64>,
    pub amihud_illiquidity: Option<f64>,
    pub trading_frequency: f64,

    // Momentum
    pub momentum_30d: Option<f64>,
    pub momentum_90d: Option<f64>,
    pub trend_strength: Option<f64>,

    // Recovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_recovery_days: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_consistency: Option<f64>,

    pub current_price: f64,
}

impl StockFeatureVector {
    /// Numeric feature by column name
    ///
    /// Outer `None`: unknown column. Inner `None`: undefined value.
    pub fn value(&self, column: &str) -> Option<Option<f64>> {
        let value = match column {
            "volatility_mean" => self.volatility_mean,
            "volatility_max" => self.volatility_max,
            "downside_deviation" => self.downside_deviation,
            "var_95" => self.var_95,
            "max_drawdown" => self.max_drawdown,
            "mean_return" => self.mean_return,
            "std_return" => self.std_return,
            "return_skew" => self.return_skew,
            "return_kurtosis" => self.return_kurtosis,
            "sharpe_ratio" => self.sharpe_ratio,
            "rsi_mean" => self.rsi_mean,
            "bb_width_mean" => self.bb_width_mean,
            "macd_volatility" => self.macd_volatility,
            "avg_volume" => self.avg_volume,
            "volume_volatility" => self.volume_volatility,
            "amihud_illiquidity" => self.amihud_illiquidity,
            "trading_frequency" => Some(self.trading_frequency),
            "momentum_30d" => self.momentum_30d,
            "momentum_90d" => self.momentum_90d,
            "trend_strength" => self.trend_strength,
            "avg_recovery_days" => self.avg_recovery_days,
            "return_consistency" => self.return_consistency,
            "current_price" => Some(self.current_price),
            _ => return None,
        };
        Some(value)
    }
}

/// Output schema for a set of feature vectors
///
/// Optional columns appear only if at least one row carries a value.
pub fn table_columns(features: &[StockFeatureVector]) -> Vec<String> {
    let mut columns: Vec<String> = IDENTITY_COLUMNS.iter().map(|c| c.to_string()).collect();
    for column in FEATURE_COLUMNS {
        let optional = OPTIONAL_FEATURE_COLUMNS.contains(&column);
        let present = !optional || features.iter().any(|f| matches!(f.value(column), Some(Some(_))));
        if present {
            columns.push(column.to_string());
        }
    }
    columns
}

/// Header and Sharpe values of a feature table, for schema checks
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    stock_codes: Vec<String>,
    sharpe: Vec<Option<f64>>,
}

impl FeatureTable {
    /// Describe an in-memory set of feature vectors
    pub fn from_features(features: &[StockFeatureVector]) -> Self {
        Self {
            columns: table_columns(features),
            stock_codes: features.iter().map(|f| f.stock_code.clone()).collect(),
            sharpe: features.iter().map(|f| f.sharpe_ratio).collect(),
        }
    }

    /// Read a feature table written as CSV
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let columns: Vec<String> = headers.iter().map(|h| h.to_string()).collect();

        let code_idx = columns.iter().position(|c| c == "stock_code");
        let sharpe_idx = columns.iter().position(|c| c == "sharpe_ratio");

        let mut stock_codes = Vec::new();
        let mut sharpe = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            let code = code_idx
                .and_then(|i| record.get(i))
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("row {}", row + 1));

            let value = match sharpe_idx.and_then(|i| record.get(i)) {
                Some(cell) if !cell.trim().is_empty() => Some(cell.trim().parse::<f64>().map_err(|_| {
                    FeatureError::ParseError(format!("Invalid sharpe_ratio '{}' for {}", cell, code))
                })?),
                _ => None,
            };

            stock_codes.push(code);
            sharpe.push(value);
        }

        Ok(Self {
            columns,
            stock_codes,
            sharpe,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.stock_codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stock_codes.is_empty()
    }

    /// Required names absent from this table's header
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|r| !self.columns.iter().any(|c| c == *r))
            .map(|r| r.to_string())
            .collect()
    }

    /// Observed Sharpe range, ignoring undefined values
    pub fn sharpe_range(&self) -> Option<(f64, f64)> {
        self.sharpe.iter().flatten().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Rows whose Sharpe ratio lies outside `[-bound, bound]`
    pub fn sharpe_out_of_bounds(&self, bound: f64) -> Vec<(String, f64)> {
        self.stock_codes
            .iter()
            .zip(&self.sharpe)
            .filter_map(|(code, s)| match s {
                Some(v) if v.abs() > bound || v.is_nan() => Some((code.clone(), *v)),
                _ => None,
            })
            .collect()
    }
}
