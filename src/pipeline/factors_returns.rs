//! Returns stage - per-day price returns
//!
//! Every other return-based stage reads `daily_return`, so this stage runs first.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::engine::{Stage, StageOutput};
use crate::series::StockSeries;
use crate::types::Column;

/// DailyReturns - single period simple returns
#[derive(Debug, Clone, Default)]
pub struct DailyReturns {
    prev_price: Option<f64>,
}

impl DailyReturns {
    pub fn new() -> Self {
        Self { prev_price: None }
    }

    /// Update with new price
    pub fn update(&mut self, price: f64) -> Option<f64> {
        let ret = self.prev_price.map(|prev| price / prev - 1.0);
        self.prev_price = Some(price);
        ret
    }

    /// Compute daily returns for a slice of prices
    pub fn compute(prices: &[f64]) -> Column {
        let mut returns = Self::new();
        prices.iter().map(|&p| returns.update(p)).collect()
    }
}

/// LogReturns - single period logarithmic returns
#[derive(Debug, Clone, Default)]
pub struct LogReturns {
    prev_price: Option<f64>,
}

impl LogReturns {
    pub fn new() -> Self {
        Self { prev_price: None }
    }

    /// Update with new price; undefined across a non-positive price
    pub fn update(&mut self, price: f64) -> Option<f64> {
        let ret = self.prev_price.and_then(|prev| {
            if prev <= 0.0 || price <= 0.0 {
                None // Log of non-positive numbers is undefined
            } else {
                Some((price / prev).ln())
            }
        });
        self.prev_price = Some(price);
        ret
    }

    /// Compute log returns for a slice of prices
    pub fn compute(prices: &[f64]) -> Column {
        let mut returns = Self::new();
        prices.iter().map(|&p| returns.update(p)).collect()
    }
}

/// Adds `daily_return` and optionally `log_return`
#[derive(Debug, Clone, Default)]
pub struct ReturnsStage;

impl Stage for ReturnsStage {
    fn name(&self) -> &str {
        "returns"
    }

    fn columns(&self, config: &PipelineConfig) -> Vec<String> {
        let mut columns = vec!["daily_return".to_string()];
        if config.log_return {
            columns.push("log_return".to_string());
        }
        columns
    }

    fn compute(&self, series: &StockSeries, config: &PipelineConfig) -> Result<StageOutput> {
        let prices = series.prices();
        let mut output = vec![("daily_return".to_string(), DailyReturns::compute(prices))];
        if config.log_return {
            output.push(("log_return".to_string(), LogReturns::compute(prices)));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_daily_returns() {
        let prices = vec![100.0, 105.0, 110.0, 108.0];
        let returns = DailyReturns::compute(&prices);

        assert_eq!(returns[0], None);
        assert_relative_eq!(returns[1].unwrap(), 0.05, epsilon = 1e-10);
        assert_relative_eq!(returns[2].unwrap(), 0.047619, epsilon = 1e-5);
        assert_relative_eq!(returns[3].unwrap(), -0.018182, epsilon = 1e-5);
    }

    #[test]
    fn test_single_record_is_all_null() {
        assert_eq!(DailyReturns::compute(&[42.0]), vec![None]);
        assert!(DailyReturns::compute(&[]).is_empty());
    }

    #[test]
    fn test_log_returns() {
        let returns = LogReturns::compute(&[100.0, 105.0, 0.0, 110.0]);

        assert_eq!(returns[0], None);
        assert_relative_eq!(returns[1].unwrap(), (105.0_f64 / 100.0).ln(), epsilon = 1e-10);
        assert_eq!(returns[2], None);
        assert_eq!(returns[3], None);
    }

    #[test]
    fn test_stage_respects_log_return_toggle() {
        let stage = ReturnsStage;
        let config = PipelineConfig::minimal();

        assert_eq!(stage.columns(&config), vec!["daily_return".to_string()]);
        assert_eq!(stage.columns(&PipelineConfig::default()).len(), 2);
    }
}
