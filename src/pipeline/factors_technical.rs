//! Technical indicator stage - RSI, Bollinger band width and MACD
//!
//! All indicators read price only. Denominators are guarded with the
//! configured epsilon so flat price histories never divide by zero.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::engine::{Stage, StageOutput};
use crate::pipeline::rolling::{diff, ExponentialMovingAverage, RollingMean, RollingStd};
use crate::series::StockSeries;
use crate::types::Column;

/// Relative Strength Index (RSI) from rolling mean gains and losses
#[derive(Debug, Clone)]
pub struct RSI {
    gains: RollingMean,
    losses: RollingMean,
    prev_value: Option<f64>,
    epsilon: f64,
}

impl RSI {
    pub fn new(period: usize, min_periods: usize, epsilon: f64) -> Self {
        Self {
            gains: RollingMean::new(period, min_periods),
            losses: RollingMean::new(period, min_periods),
            prev_value: None,
            epsilon,
        }
    }

    /// Update with new price
    ///
    /// The first row has no price change and contributes a zero gain and loss.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        let change = self.prev_value.map(|prev| value - prev).unwrap_or(0.0);
        self.prev_value = Some(value);

        let gain = self.gains.update(Some(change.max(0.0)));
        let loss = self.losses.update(Some((-change).max(0.0)));

        match (gain, loss) {
            (Some(gain), Some(loss)) => {
                let rs = gain / (loss + self.epsilon);
                Some(100.0 - 100.0 / (1.0 + rs))
            }
            _ => None,
        }
    }

    pub fn compute(period: usize, min_periods: usize, epsilon: f64, values: &[f64]) -> Column {
        let mut rsi = Self::new(period, min_periods, epsilon);
        values.iter().map(|&v| rsi.update(v)).collect()
    }
}

/// Bollinger band width and position
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerOutput {
    /// `100 * std / (ma + eps)`
    pub width: Column,
    /// `(price - ma) / (std + eps)`
    pub position: Column,
}

/// Bollinger band statistics over a rolling window
pub fn bollinger(window: usize, min_periods: usize, epsilon: f64, prices: &[f64]) -> BollingerOutput {
    let values: Column = prices.iter().map(|&p| Some(p)).collect();
    let ma = RollingMean::compute(window, min_periods, &values);
    let std = RollingStd::compute(window, min_periods, &values);

    let width = ma
        .iter()
        .zip(&std)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(100.0 * s / (m + epsilon)),
            _ => None,
        })
        .collect();
    let position = prices
        .iter()
        .zip(ma.iter().zip(&std))
        .map(|(p, (m, s))| match (m, s) {
            (Some(m), Some(s)) => Some((p - m) / (s + epsilon)),
            _ => None,
        })
        .collect();

    BollingerOutput { width, position }
}

/// Moving Average Convergence Divergence (MACD)
#[derive(Debug, Clone)]
pub struct MACD {
    fast_ema: ExponentialMovingAverage,
    slow_ema: ExponentialMovingAverage,
    signal_ema: ExponentialMovingAverage,
}

impl MACD {
    /// Create new MACD with standard parameters (12, 26, 9)
    pub fn new() -> Self {
        Self::with_params(12, 26, 9)
    }

    /// Create MACD with custom parameters
    pub fn with_params(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast_ema: ExponentialMovingAverage::new(fast),
            slow_ema: ExponentialMovingAverage::new(slow),
            signal_ema: ExponentialMovingAverage::new(signal),
        }
    }

    /// Update with new value, returns (MACD line, signal line)
    pub fn update(&mut self, value: f64) -> (f64, f64) {
        let fast = self.fast_ema.update(value);
        let slow = self.slow_ema.update(value);
        let macd_line = fast - slow;
        let signal_line = self.signal_ema.update(macd_line);

        (macd_line, signal_line)
    }
}

impl Default for MACD {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds `rsi`, `bb_width`, `macd` and the optional `bb_position`, `macd_signal`
#[derive(Debug, Clone, Default)]
pub struct TechnicalStage;

impl Stage for TechnicalStage {
    fn name(&self) -> &str {
        "technical"
    }

    fn columns(&self, config: &PipelineConfig) -> Vec<String> {
        let mut columns = vec!["rsi".to_string(), "bb_width".to_string()];
        if config.bb_position {
            columns.push("bb_position".to_string());
        }
        columns.push("macd".to_string());
        if config.macd_signal {
            columns.push("macd_signal".to_string());
        }
        columns
    }

    fn compute(&self, series: &StockSeries, config: &PipelineConfig) -> Result<StageOutput> {
        let prices = series.prices();

        let rsi = RSI::compute(config.rsi_period, config.rsi_min_periods, config.epsilon, prices);
        let bands = bollinger(
            config.bollinger_window,
            config.bollinger_min_periods,
            config.epsilon,
            prices,
        );

        let mut macd = MACD::with_params(config.macd_fast, config.macd_slow, config.macd_signal_span);
        let (macd_line, signal_line): (Vec<f64>, Vec<f64>) = prices.iter().map(|&p| macd.update(p)).unzip();

        let mut output = vec![
            ("rsi".to_string(), rsi),
            ("bb_width".to_string(), bands.width),
        ];
        if config.bb_position {
            output.push(("bb_position".to_string(), bands.position));
        }
        output.push(("macd".to_string(), macd_line.into_iter().map(Some).collect()));
        if config.macd_signal {
            output.push(("macd_signal".to_string(), signal_line.into_iter().map(Some).collect()));
        }

        Ok(output)
    }
}
