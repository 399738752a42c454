//! Invariants that hold for any price/volume history

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use stock_features::prelude::*;

fn build_series(prices: &[f64], volumes: &[Option<f64>]) -> StockSeries {
    let start = NaiveDate::from_ymd_opt(2019, 6, 3).unwrap();
    let records = prices
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&p, &v))| DailyRecord::new("PROP", start + Duration::days(i as i64), p, v))
        .collect();
    StockSeries::from_records(records).unwrap()
}

fn history() -> impl Strategy<Value = (Vec<f64>, Vec<Option<f64>>)> {
    (1usize..120).prop_flat_map(|len| {
        (
            prop::collection::vec(0.5f64..500.0, len),
            prop::collection::vec(
                prop_oneof![
                    3 => (1.0f64..1e6).prop_map(Some),
                    1 => Just(Some(0.0)),
                    1 => Just(None),
                ],
                len,
            ),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_sharpe_within_bound((prices, volumes) in history()) {
        let pipeline = Pipeline::with_default_stages(PipelineConfig::default()).unwrap();
        if let Some(features) = pipeline.run_series(build_series(&prices, &volumes)).unwrap() {
            if let Some(sharpe) = features.sharpe_ratio {
                prop_assert!((-5.0..=5.0).contains(&sharpe));
            }
        }
    }

    #[test]
    fn prop_trading_frequency_is_a_fraction((prices, volumes) in history()) {
        let pipeline = Pipeline::with_default_stages(PipelineConfig::default()).unwrap();
        if let Some(features) = pipeline.run_series(build_series(&prices, &volumes)).unwrap() {
            prop_assert!((0.0..=1.0).contains(&features.trading_frequency));
        }
    }

    #[test]
    fn prop_exclusion_matches_active_days((prices, volumes) in history()) {
        let pipeline = Pipeline::with_default_stages(PipelineConfig::default()).unwrap();
        let active = volumes.iter().filter(|v| matches!(v, Some(x) if *x > 0.0)).count();
        let result = pipeline.run_series(build_series(&prices, &volumes)).unwrap();
        prop_assert_eq!(result.is_some(), active >= 20);
    }

    #[test]
    fn prop_max_drawdown_non_positive((prices, volumes) in history()) {
        let pipeline = Pipeline::with_default_stages(PipelineConfig::default()).unwrap();
        let derived = pipeline.derive(build_series(&prices, &volumes)).unwrap();
        let max_drawdown = derived.column("max_drawdown").unwrap();
        prop_assert!(max_drawdown.iter().flatten().all(|&m| m <= 0.0));
    }

    #[test]
    fn prop_runs_are_deterministic((prices, volumes) in history()) {
        let pipeline = Pipeline::with_default_stages(PipelineConfig::default()).unwrap();
        let first = pipeline.run_series(build_series(&prices, &volumes)).unwrap();
        let second = pipeline.run_series(build_series(&prices, &volumes)).unwrap();
        prop_assert_eq!(first, second);
    }
}
