//! Risk stage - downside deviation and empirical Value-at-Risk

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::engine::{Stage, StageOutput};
use crate::pipeline::rolling::{RollingQuantile, RollingStd};
use crate::series::StockSeries;
use crate::types::Column;

/// Rolling std of the loss-only return series (gains replaced by 0)
pub fn downside_deviation(window: usize, min_periods: usize, returns: &[Option<f64>]) -> Column {
    let losses: Column = returns.iter().map(|r| r.map(|v| v.min(0.0))).collect();
    RollingStd::compute(window, min_periods, &losses)
}

/// Adds `downside_deviation_30d` and `var_95`
#[derive(Debug, Clone, Default)]
pub struct RiskStage;

impl Stage for RiskStage {
    fn name(&self) -> &str {
        "risk"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["returns".to_string()]
    }

    fn columns(&self, _config: &PipelineConfig) -> Vec<String> {
        vec!["downside_deviation_30d".to_string(), "var_95".to_string()]
    }

    fn compute(&self, series: &StockSeries, config: &PipelineConfig) -> Result<StageOutput> {
        let returns = series.require_column("daily_return")?;

        let downside = downside_deviation(config.downside_window, config.downside_min_periods, returns);
        let var = RollingQuantile::compute(config.var_window, config.var_min_periods, config.var_quantile, returns);

        Ok(vec![
            ("downside_deviation_30d".to_string(), downside),
            ("var_95".to_string(), var),
        ])
    }
}
