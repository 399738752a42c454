//! Pipeline configuration
//!
//! Every window size, minimum-period floor and numeric guard used by the
//! stages lives here, so a run is fully described by one value.

use crate::error::{FeatureError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default denominator guard
pub const EPSILON: f64 = 1e-10;

/// Default daily risk-free rate (~2.5% annualized)
pub const RISK_FREE_RATE: f64 = 0.0001;

/// Default Sharpe clamp bound
pub const SHARPE_BOUND: f64 = 5.0;

/// Default minimum number of active trading days
pub const MIN_ACTIVE_DAYS: usize = 20;

/// Moving average window with its minimum-period floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingAverageSpec {
    pub window: usize,
    pub min_periods: usize,
}

impl MovingAverageSpec {
    pub const fn new(window: usize, min_periods: usize) -> Self {
        Self {
            window,
            min_periods,
        }
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub epsilon: f64,
    pub risk_free_rate: f64,
    pub sharpe_bound: f64,
    pub min_active_days: usize,

    pub volatility_windows: Vec<usize>,

    pub downside_window: usize,
    pub downside_min_periods: usize,
    pub var_window: usize,
    pub var_min_periods: usize,
    pub var_quantile: f64,

    pub rsi_period: usize,
    pub rsi_min_periods: usize,
    pub bollinger_window: usize,
    pub bollinger_min_periods: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal_span: usize,

    pub liquidity_window: usize,
    pub liquidity_min_periods: usize,

    pub momentum_horizons: Vec<usize>,
    pub moving_averages: Vec<MovingAverageSpec>,

    /// Emit `log_return`
    pub log_return: bool,
    /// Emit `bb_position`
    pub bb_position: bool,
    /// Emit `macd_signal`
    pub macd_signal: bool,
    /// Emit `days_from_peak` and aggregate it into `avg_recovery_days`
    pub days_from_peak: bool,
    /// Aggregate `return_consistency`
    pub return_consistency: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            epsilon: EPSILON,
            risk_free_rate: RISK_FREE_RATE,
            sharpe_bound: SHARPE_BOUND,
            min_active_days: MIN_ACTIVE_DAYS,
            volatility_windows: vec![7, 14, 30],
            downside_window: 30,
            downside_min_periods: 10,
            var_window: 60,
            var_min_periods: 20,
            var_quantile: 0.05,
            rsi_period: 14,
            rsi_min_periods: 5,
            bollinger_window: 20,
            bollinger_min_periods: 10,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal_span: 9,
            liquidity_window: 30,
            liquidity_min_periods: 10,
            momentum_horizons: vec![7, 30, 90],
            moving_averages: vec![
                MovingAverageSpec::new(7, 3),
                MovingAverageSpec::new(30, 10),
                MovingAverageSpec::new(50, 20),
            ],
            log_return: true,
            bb_position: true,
            macd_signal: true,
            days_from_peak: true,
            return_consistency: false,
        }
    }
}

impl PipelineConfig {
    /// Configuration producing only the columns the aggregator consumes
    pub fn minimal() -> Self {
        Self {
            log_return: false,
            bb_position: false,
            macd_signal: false,
            days_from_peak: false,
            return_consistency: false,
            ..Self::default()
        }
    }

    /// Minimum non-null observations for a volatility window: `max(3, w / 2)`
    pub fn volatility_min_periods(window: usize) -> usize {
        (window / 2).max(3)
    }

    /// Parse from TOML text; absent keys keep their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FeatureError::ConfigError(e.to_string()))
    }

    /// Reject configurations no stage can run with
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon > 0.0) {
            return Err(FeatureError::ConfigError(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if !(self.sharpe_bound >= 0.0) {
            return Err(FeatureError::ConfigError(format!(
                "sharpe_bound must be non-negative, got {}",
                self.sharpe_bound
            )));
        }
        if !(self.var_quantile > 0.0 && self.var_quantile < 1.0) {
            return Err(FeatureError::ConfigError(format!(
                "var_quantile must lie in (0, 1), got {}",
                self.var_quantile
            )));
        }

        let windows = [
            ("downside_window", self.downside_window),
            ("var_window", self.var_window),
            ("rsi_period", self.rsi_period),
            ("bollinger_window", self.bollinger_window),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal_span", self.macd_signal_span),
            ("liquidity_window", self.liquidity_window),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(FeatureError::ConfigError(format!("{} must be greater than 0", name)));
            }
        }
        if self.volatility_windows.contains(&0) {
            return Err(FeatureError::ConfigError(
                "volatility windows must be greater than 0".to_string(),
            ));
        }
        if self.momentum_horizons.contains(&0) {
            return Err(FeatureError::ConfigError(
                "momentum horizons must be greater than 0".to_string(),
            ));
        }
        if let Some(ma) = self.moving_averages.iter().find(|ma| ma.window == 0) {
            return Err(FeatureError::ConfigError(format!(
                "moving average window must be greater than 0 (min_periods {})",
                ma.min_periods
            )));
        }

        if !self.volatility_windows.contains(&30) {
            log::warn!("no 30-day volatility window configured; volatility aggregates fall back to 0");
        }
        if !self.moving_averages.iter().any(|ma| ma.window == 50) {
            log::warn!("no 50-day moving average configured; trend_strength falls back to 0");
        }

        Ok(())
    }
}
