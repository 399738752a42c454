//! Aggregator - reduces one stock's derived series to a single feature vector
//!
//! Stocks with fewer active trading days than `min_active_days` produce no
//! vector at all. An aggregate whose source column was never computed takes a
//! neutral default (`rsi_mean` 50, everything else 0); a column that exists but
//! holds no values yields an undefined aggregate instead.

use crate::config::PipelineConfig;
use crate::features::StockFeatureVector;
use crate::pipeline::factors_momentum::{momentum_column, price_to_ma_column};
use crate::pipeline::factors_volatility::volatility_column;
use crate::series::StockSeries;
use statrs::statistics::{Data, Median, Statistics};

/// Neutral RSI used when no RSI column exists
pub const RSI_DEFAULT: f64 = 50.0;

/// Default for every other missing source column
pub const FEATURE_DEFAULT: f64 = 0.0;

fn observed(column: &[Option<f64>]) -> Vec<f64> {
    column.iter().flatten().copied().filter(|v| !v.is_nan()).collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}

fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        None
    } else {
        Some(values.iter().std_dev())
    }
}

fn max(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(Statistics::max(values.iter()))
    }
}

fn min(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(Statistics::min(values.iter()))
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(Data::new(values.to_vec()).median())
    }
}

/// Sums of squared deviations below this are rounding noise
const ZERO_VARIANCE: f64 = 1e-14;

fn zero_out_noise(value: f64) -> f64 {
    if value.abs() < ZERO_VARIANCE {
        0.0
    } else {
        value
    }
}

/// Bias-adjusted sample skewness; 0 for a (near-)constant sample
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let m = values.iter().mean();
    let s2 = zero_out_noise(values.iter().map(|v| (v - m).powi(2)).sum::<f64>());
    let s3 = zero_out_noise(values.iter().map(|v| (v - m).powi(3)).sum::<f64>());

    if s2 == 0.0 {
        return Some(0.0);
    }
    Some(nf * (nf - 1.0).sqrt() / (nf - 2.0) * s3 / s2.powf(1.5))
}

/// Bias-adjusted sample excess kurtosis; 0 for a (near-)constant sample
pub fn excess_kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    let nf = n as f64;
    let m = values.iter().mean();
    let s2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    let s4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>();

    let numerator = zero_out_noise((nf + 1.0) * nf * (nf - 1.0) * s4);
    let denominator = zero_out_noise((nf - 2.0) * (nf - 3.0) * s2 * s2);
    if denominator == 0.0 {
        return Some(0.0);
    }
    let correction = 3.0 * (nf - 1.0).powi(2) / ((nf - 2.0) * (nf - 3.0));
    Some(numerator / denominator - correction)
}

/// Return distribution over active days
#[derive(Debug, Clone, Copy, PartialEq)]
struct ReturnProfile {
    mean: Option<f64>,
    std: Option<f64>,
    skew: Option<f64>,
    kurtosis: Option<f64>,
    sharpe: Option<f64>,
    consistency: Option<f64>,
}

/// Reduces derived series to feature vectors
#[derive(Debug, Clone)]
pub struct Aggregator {
    config: PipelineConfig,
}

impl Aggregator {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Derived columns this aggregator reads
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns = vec![
            volatility_column(30),
            "downside_deviation_30d".to_string(),
            "var_95".to_string(),
            "max_drawdown".to_string(),
            "daily_return".to_string(),
            "rsi".to_string(),
            "bb_width".to_string(),
            "macd".to_string(),
            "amihud_illiquidity".to_string(),
            momentum_column(30),
            momentum_column(90),
            price_to_ma_column(50),
        ];
        if self.config.days_from_peak {
            columns.push("days_from_peak".to_string());
        }
        columns
    }

    /// Sharpe ratio clamped to `[-sharpe_bound, sharpe_bound]`
    pub fn sharpe_ratio(&self, mean_return: f64, std_return: f64) -> f64 {
        let bound = self.config.sharpe_bound.abs();
        let raw = (mean_return - self.config.risk_free_rate) / (std_return + self.config.epsilon);
        raw.max(-bound).min(bound)
    }

    /// Statistic over a column, or `default` when the column is absent
    fn column_stat(
        &self,
        series: &StockSeries,
        name: &str,
        default: f64,
        stat: impl Fn(&[f64]) -> Option<f64>,
    ) -> Option<f64> {
        match series.column(name) {
            Some(column) => stat(&observed(column)),
            None => {
                log::trace!("{}: column '{}' absent, using default {}", series.stock_code(), name, default);
                Some(default)
            }
        }
    }

    /// Most recent value of a column, or `default` when the column is absent
    fn final_value(&self, series: &StockSeries, name: &str, default: f64) -> Option<f64> {
        match series.last_value(name) {
            Some(value) => value.filter(|v| !v.is_nan()),
            None => {
                log::trace!("{}: column '{}' absent, using default {}", series.stock_code(), name, default);
                Some(default)
            }
        }
    }

    fn return_profile(&self, series: &StockSeries, active: &[usize]) -> ReturnProfile {
        let Some(returns) = series.column("daily_return") else {
            log::trace!("{}: no daily_return column, return statistics use defaults", series.stock_code());
            return ReturnProfile {
                mean: Some(FEATURE_DEFAULT),
                std: Some(FEATURE_DEFAULT),
                skew: Some(FEATURE_DEFAULT),
                kurtosis: Some(FEATURE_DEFAULT),
                sharpe: Some(FEATURE_DEFAULT),
                consistency: Some(FEATURE_DEFAULT),
            };
        };

        let values: Vec<f64> = active
            .iter()
            .filter_map(|&i| returns[i])
            .filter(|v| !v.is_nan())
            .collect();

        let mean = mean(&values);
        let std = std_dev(&values);
        let sharpe = match (mean, std) {
            (Some(m), Some(s)) => Some(self.sharpe_ratio(m, s)),
            _ => None,
        };
        let consistency = if values.is_empty() {
            None
        } else {
            Some(values.iter().filter(|&&r| r > 0.0).count() as f64 / values.len() as f64)
        };

        ReturnProfile {
            mean,
            std,
            skew: skewness(&values),
            kurtosis: excess_kurtosis(&values),
            sharpe,
            consistency,
        }
    }

    /// Reduce a derived series; `None` when it has too few active days
    pub fn aggregate(&self, series: &StockSeries) -> Option<StockFeatureVector> {
        let active = series.active_days();
        if active.len() < self.config.min_active_days {
            log::debug!(
                "Excluding {}: {} active days, need {}",
                series.stock_code(),
                active.len(),
                self.config.min_active_days
            );
            return None;
        }

        let current_price = *series.prices().last()?;
        let profile = self.return_profile(series, &active);
        let active_volumes: Vec<f64> = active.iter().filter_map(|&i| series.volumes()[i]).collect();
        let vol30 = volatility_column(30);

        let avg_recovery_days = if self.config.days_from_peak {
            self.column_stat(series, "days_from_peak", FEATURE_DEFAULT, mean)
        } else {
            None
        };
        let return_consistency = if self.config.return_consistency {
            profile.consistency
        } else {
            None
        };

        Some(StockFeatureVector {
            stock_code: series.stock_code().to_string(),
            sector: series.sector().map(str::to_string),
            name: series.name().map(str::to_string),

            volatility_mean: self.column_stat(series, &vol30, FEATURE_DEFAULT, mean),
            volatility_max: self.column_stat(series, &vol30, FEATURE_DEFAULT, max),
            downside_deviation: self.column_stat(series, "downside_deviation_30d", FEATURE_DEFAULT, mean),
            var_95: self.column_stat(series, "var_95", FEATURE_DEFAULT, mean),
            max_drawdown: self.column_stat(series, "max_drawdown", FEATURE_DEFAULT, min),

            mean_return: profile.mean,
            std_return: profile.std,
            return_skew: profile.skew,
            return_kurtosis: profile.kurtosis,
            sharpe_ratio: profile.sharpe,

            rsi_mean: self.column_stat(series, "rsi", RSI_DEFAULT, mean),
            bb_width_mean: self.column_stat(series, "bb_width", FEATURE_DEFAULT, mean),
            macd_volatility: self.column_stat(series, "macd", FEATURE_DEFAULT, std_dev),

            avg_volume: mean(&active_volumes),
            volume_volatility: std_dev(&active_volumes),
            amihud_illiquidity: self.column_stat(series, "amihud_illiquidity", FEATURE_DEFAULT, median),
            trading_frequency: active.len() as f64 / series.len() as f64,

            momentum_30d: self.final_value(series, &momentum_column(30), FEATURE_DEFAULT),
            momentum_90d: self.final_value(series, &momentum_column(90), FEATURE_DEFAULT),
            trend_strength: self.final_value(series, &price_to_ma_column(50), FEATURE_DEFAULT),

            avg_recovery_days,
            return_consistency,

            current_price,
        })
    }
}
