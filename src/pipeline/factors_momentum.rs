//! Momentum stage - multi-horizon momentum and moving-average trend ratios

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::engine::{Stage, StageOutput};
use crate::pipeline::rolling::{pct_change, RollingMean};
use crate::series::StockSeries;
use crate::types::Column;

pub fn momentum_column(horizon: usize) -> String {
    format!("momentum_{}d", horizon)
}

pub fn moving_average_column(window: usize) -> String {
    format!("ma_{}", window)
}

pub fn price_to_ma_column(window: usize) -> String {
    format!("price_to_ma{}", window)
}

/// `(price - ma) / (ma + eps)`; undefined while the average is
pub fn price_to_ma(prices: &[f64], ma: &[Option<f64>], epsilon: f64) -> Column {
    prices
        .iter()
        .zip(ma)
        .map(|(p, m)| m.map(|m| (p - m) / (m + epsilon)))
        .collect()
}

/// Adds `momentum_{h}d`, `ma_{w}` and `price_to_ma{w}`
#[derive(Debug, Clone, Default)]
pub struct MomentumStage;

impl Stage for MomentumStage {
    fn name(&self) -> &str {
        "momentum"
    }

    fn columns(&self, config: &PipelineConfig) -> Vec<String> {
        let mut columns: Vec<String> = config.momentum_horizons.iter().map(|&h| momentum_column(h)).collect();
        columns.extend(config.moving_averages.iter().map(|ma| moving_average_column(ma.window)));
        columns.extend(config.moving_averages.iter().map(|ma| price_to_ma_column(ma.window)));
        columns
    }

    fn compute(&self, series: &StockSeries, config: &PipelineConfig) -> Result<StageOutput> {
        let prices = series.prices();
        let values: Column = prices.iter().map(|&p| Some(p)).collect();

        let mut output: StageOutput = config
            .momentum_horizons
            .iter()
            .map(|&h| (momentum_column(h), pct_change(h, &values)))
            .collect();

        let averages: Vec<(usize, Column)> = config
            .moving_averages
            .iter()
            .map(|ma| (ma.window, RollingMean::compute(ma.window, ma.min_periods, &values)))
            .collect();

        for (window, ma) in &averages {
            output.push((moving_average_column(*window), ma.clone()));
        }
        for (window, ma) in &averages {
            output.push((price_to_ma_column(*window), price_to_ma(prices, ma, config.epsilon)));
        }

        Ok(output)
    }
}
