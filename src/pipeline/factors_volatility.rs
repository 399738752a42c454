//! Volatility stage - rolling standard deviation of daily returns

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::engine::{Stage, StageOutput};
use crate::pipeline::rolling::RollingStd;
use crate::series::StockSeries;

/// Name of the volatility column for a window
pub fn volatility_column(window: usize) -> String {
    format!("volatility_{}d", window)
}

/// Adds `volatility_{w}d` for every configured window
///
/// Each window needs `max(3, w / 2)` non-null returns before it reports a value.
#[derive(Debug, Clone, Default)]
pub struct VolatilityStage;

impl Stage for VolatilityStage {
    fn name(&self) -> &str {
        "volatility"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["returns".to_string()]
    }

    fn columns(&self, config: &PipelineConfig) -> Vec<String> {
        config.volatility_windows.iter().map(|&w| volatility_column(w)).collect()
    }

    fn compute(&self, series: &StockSeries, config: &PipelineConfig) -> Result<StageOutput> {
        let returns = series.require_column("daily_return")?;

        Ok(config
            .volatility_windows
            .iter()
            .map(|&window| {
                let min_periods = PipelineConfig::volatility_min_periods(window);
                (
                    volatility_column(window),
                    RollingStd::compute(window, min_periods, returns),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DailyRecord;
    use chrono::NaiveDate;

    fn series_with_returns(days: usize) -> StockSeries {
        let start = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        let records = (0..days)
            .map(|i| {
                let price = 50.0 + if i % 2 == 0 { 1.0 } else { -1.0 } + i as f64 * 0.1;
                DailyRecord::new("EABL", start + chrono::Duration::days(i as i64), price, Some(10.0))
            })
            .collect();
        let mut series = StockSeries::from_records(records).unwrap();
        let returns = crate::pipeline::factors_returns::DailyReturns::compute(series.prices());
        series.insert_column("daily_return", returns).unwrap();
        series
    }

    #[test]
    fn test_min_period_floor_for_30_day_window() {
        let series = series_with_returns(40);
        let output = VolatilityStage.compute(&series, &PipelineConfig::default()).unwrap();

        let (name, vol30) = &output[2];
        assert_eq!(name, "volatility_30d");
        // Row 14 has 14 non-null returns, row 15 has 15
        assert_eq!(vol30[14], None);
        assert!(vol30[15].is_some());
    }

    #[test]
    fn test_short_window_floor_of_three() {
        let series = series_with_returns(10);
        let output = VolatilityStage.compute(&series, &PipelineConfig::default()).unwrap();

        let (name, vol7) = &output[0];
        assert_eq!(name, "volatility_7d");
        assert_eq!(vol7[2], None);
        assert!(vol7[3].is_some());
    }

    #[test]
    fn test_requires_returns() {
        let start = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        let series = StockSeries::from_records(vec![DailyRecord::new("EABL", start, 1.0, None)]).unwrap();

        assert!(VolatilityStage.compute(&series, &PipelineConfig::default()).is_err());
    }
}
