//! Liquidity stage - volume statistics and the Amihud illiquidity ratio
//!
//! - `avg_volume` / `volume_volatility`: rolling mean and std of volume
//! - `volume_trend`: fractional change of volume over the liquidity window
//! - `amihud_illiquidity`: absolute return per unit of currency traded

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::engine::{Stage, StageOutput};
use crate::pipeline::rolling::{pct_change, RollingMean, RollingStd};
use crate::series::StockSeries;
use crate::types::Column;

/// AmihudIlliquidity - price impact per unit of traded value
#[derive(Debug, Clone)]
pub struct AmihudIlliquidity {
    epsilon: f64,
}

impl AmihudIlliquidity {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// `|return| / (volume * price + eps)`; undefined without a return or volume
    pub fn value(&self, ret: Option<f64>, volume: Option<f64>, price: f64) -> Option<f64> {
        match (ret, volume) {
            (Some(r), Some(v)) => Some(r.abs() / (v * price + self.epsilon)),
            _ => None,
        }
    }

    pub fn compute(&self, returns: &[Option<f64>], volumes: &[Option<f64>], prices: &[f64]) -> Column {
        returns
            .iter()
            .zip(volumes)
            .zip(prices)
            .map(|((&r, &v), &p)| self.value(r, v, p))
            .collect()
    }
}

/// Adds `avg_volume`, `volume_volatility`, `volume_trend`, `amihud_illiquidity`
#[derive(Debug, Clone, Default)]
pub struct LiquidityStage;

impl Stage for LiquidityStage {
    fn name(&self) -> &str {
        "liquidity"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["returns".to_string()]
    }

    fn columns(&self, _config: &PipelineConfig) -> Vec<String> {
        vec![
            "avg_volume".to_string(),
            "volume_volatility".to_string(),
            "volume_trend".to_string(),
            "amihud_illiquidity".to_string(),
        ]
    }

    fn compute(&self, series: &StockSeries, config: &PipelineConfig) -> Result<StageOutput> {
        let returns = series.require_column("daily_return")?;
        let volumes = series.volumes();
        let window = config.liquidity_window;
        let min_periods = config.liquidity_min_periods;

        Ok(vec![
            ("avg_volume".to_string(), RollingMean::compute(window, min_periods, volumes)),
            ("volume_volatility".to_string(), RollingStd::compute(window, min_periods, volumes)),
            ("volume_trend".to_string(), pct_change(window, volumes)),
            (
                "amihud_illiquidity".to_string(),
                AmihudIlliquidity::new(config.epsilon).compute(returns, volumes, series.prices()),
            ),
        ])
    }
}
