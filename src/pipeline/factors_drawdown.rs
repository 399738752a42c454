//! Drawdown stage - running peak, current and maximum drawdown
//!
//! `days_from_peak` is produced by a single forward scan that tracks the index
//! of the last running maximum; values already emitted are never revisited.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::engine::{Stage, StageOutput};
use crate::pipeline::rolling::{expanding_max, expanding_min};
use crate::series::StockSeries;
use crate::types::Column;

/// DaysFromPeak - periods since the most recent running maximum
#[derive(Debug, Clone, Default)]
pub struct DaysFromPeak {
    index: usize,
    peak_index: usize,
    running_max: Option<f64>,
}

impl DaysFromPeak {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with new price
    pub fn update(&mut self, price: f64) -> usize {
        let is_peak = match self.running_max {
            Some(max) => price >= max,
            None => true,
        };
        if is_peak {
            self.running_max = Some(price);
            self.peak_index = self.index;
        }

        let days = self.index - self.peak_index;
        self.index += 1;
        days
    }

    pub fn compute(prices: &[f64]) -> Vec<usize> {
        let mut tracker = Self::new();
        prices.iter().map(|&p| tracker.update(p)).collect()
    }
}

/// Drawdown columns for a price history
#[derive(Debug, Clone, PartialEq)]
pub struct Drawdown {
    pub running_max: Vec<f64>,
    /// `(price - running_max) / running_max`, never positive
    pub current: Vec<f64>,
    /// Worst drawdown seen so far
    pub max: Column,
}

impl Drawdown {
    pub fn compute(prices: &[f64]) -> Self {
        let running_max = expanding_max(prices);
        let current: Vec<f64> = prices
            .iter()
            .zip(&running_max)
            .map(|(p, m)| (p - m) / m)
            .collect();
        let as_column: Column = current.iter().map(|&c| Some(c)).collect();
        let max = expanding_min(&as_column);

        Self {
            running_max,
            current,
            max,
        }
    }
}

/// Adds `running_max`, `current_drawdown`, `max_drawdown` and optionally `days_from_peak`
#[derive(Debug, Clone, Default)]
pub struct DrawdownStage;

impl Stage for DrawdownStage {
    fn name(&self) -> &str {
        "drawdown"
    }

    fn columns(&self, config: &PipelineConfig) -> Vec<String> {
        let mut columns = vec![
            "running_max".to_string(),
            "current_drawdown".to_string(),
            "max_drawdown".to_string(),
        ];
        if config.days_from_peak {
            columns.push("days_from_peak".to_string());
        }
        columns
    }

    fn compute(&self, series: &StockSeries, config: &PipelineConfig) -> Result<StageOutput> {
        let prices = series.prices();
        let drawdown = Drawdown::compute(prices);

        let mut output = vec![
            ("running_max".to_string(), drawdown.running_max.into_iter().map(Some).collect()),
            ("current_drawdown".to_string(), drawdown.current.into_iter().map(Some).collect()),
            ("max_drawdown".to_string(), drawdown.max),
        ];
        if config.days_from_peak {
            let days = DaysFromPeak::compute(prices);
            output.push((
                "days_from_peak".to_string(),
                days.into_iter().map(|d| Some(d as f64)).collect(),
            ));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_drawdown_sequence() {
        let prices = vec![100.0, 120.0, 90.0, 110.0, 130.0, 65.0];
        let dd = Drawdown::compute(&prices);

        assert_eq!(dd.running_max, vec![100.0, 120.0, 120.0, 120.0, 130.0, 130.0]);
        assert_relative_eq!(dd.current[2], -0.25, epsilon = 1e-12);
        assert_relative_eq!(dd.current[4], 0.0, epsilon = 1e-12);
        assert_relative_eq!(dd.max[3].unwrap(), -0.25, epsilon = 1e-12);
        assert_relative_eq!(dd.max[4].unwrap(), -0.25, epsilon = 1e-12);
        assert_relative_eq!(dd.max[5].unwrap(), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_drawdown_never_positive() {
        let prices = vec![5.0, 7.0, 3.0, 9.0, 8.5, 12.0];
        let dd = Drawdown::compute(&prices);

        assert!(dd.current.iter().all(|&c| c <= 0.0));
        assert!(dd.max.iter().flatten().all(|&m| m <= 0.0));
    }

    #[test]
    fn test_increasing_prices_have_no_drawdown() {
        let prices: Vec<f64> = (0..25).map(|i| 10.0 + i as f64).collect();
        let dd = Drawdown::compute(&prices);

        assert_eq!(dd.max.last().copied().flatten(), Some(0.0));
        assert_eq!(DaysFromPeak::compute(&prices), vec![0; 25]);
    }

    #[test]
    fn test_days_from_peak() {
        let prices = vec![100.0, 120.0, 90.0, 110.0, 120.0, 80.0, 85.0];
        assert_eq!(DaysFromPeak::compute(&prices), vec![0, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_days_from_peak_is_causal() {
        let prices = vec![10.0, 9.0, 8.0, 11.0];
        let prefix = DaysFromPeak::compute(&prices[..3]);
        let full = DaysFromPeak::compute(&prices);

        assert_eq!(&full[..3], prefix.as_slice());
    }
}
