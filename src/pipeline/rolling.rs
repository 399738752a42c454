//! Causal window primitives shared by every stage
//!
//! A rolling window of size `w` covers the trailing `w` rows ending at the
//! current one, nulls included. Statistics are taken over the non-null values
//! in the window and are defined only once `min_periods` of them are present.

use crate::types::Column;
use std::collections::VecDeque;

/// Trailing window of optional observations
#[derive(Debug, Clone)]
struct Window {
    window: usize,
    min_periods: usize,
    values: VecDeque<Option<f64>>,
}

impl Window {
    fn new(window: usize, min_periods: usize) -> Self {
        if window == 0 {
            panic!("Window must be greater than 0");
        }
        Self {
            window,
            min_periods,
            values: VecDeque::with_capacity(window),
        }
    }

    /// Push a row; returns the window's non-null values if the floor is met
    fn push(&mut self, value: Option<f64>) -> Option<Vec<f64>> {
        self.values.push_back(value.filter(|v| !v.is_nan()));

        if self.values.len() > self.window {
            self.values.pop_front();
        }

        let observed: Vec<f64> = self.values.iter().flatten().copied().collect();
        if observed.len() >= self.min_periods.max(1) {
            Some(observed)
        } else {
            None
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (n - 1) standard deviation; `None` below two values
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Quantile with linear interpolation between order statistics
pub(crate) fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Rolling mean
#[derive(Debug, Clone)]
pub struct RollingMean {
    inner: Window,
}

impl RollingMean {
    pub fn new(window: usize, min_periods: usize) -> Self {
        Self {
            inner: Window::new(window, min_periods),
        }
    }

    pub fn update(&mut self, value: Option<f64>) -> Option<f64> {
        self.inner.push(value).map(|observed| mean(&observed))
    }

    pub fn compute(window: usize, min_periods: usize, values: &[Option<f64>]) -> Column {
        let mut rolling = Self::new(window, min_periods);
        values.iter().map(|&v| rolling.update(v)).collect()
    }
}

/// Rolling sample standard deviation
#[derive(Debug, Clone)]
pub struct RollingStd {
    inner: Window,
}

impl RollingStd {
    pub fn new(window: usize, min_periods: usize) -> Self {
        Self {
            inner: Window::new(window, min_periods),
        }
    }

    pub fn update(&mut self, value: Option<f64>) -> Option<f64> {
        self.inner.push(value).and_then(|observed| sample_std(&observed))
    }

    pub fn compute(window: usize, min_periods: usize, values: &[Option<f64>]) -> Column {
        let mut rolling = Self::new(window, min_periods);
        values.iter().map(|&v| rolling.update(v)).collect()
    }
}

/// Rolling empirical quantile
#[derive(Debug, Clone)]
pub struct RollingQuantile {
    inner: Window,
    q: f64,
}

impl RollingQuantile {
    pub fn new(window: usize, min_periods: usize, q: f64) -> Self {
        Self {
            inner: Window::new(window, min_periods),
            q,
        }
    }

    pub fn update(&mut self, value: Option<f64>) -> Option<f64> {
        let q = self.q;
        self.inner.push(value).and_then(|observed| quantile(&observed, q))
    }

    pub fn compute(window: usize, min_periods: usize, q: f64, values: &[Option<f64>]) -> Column {
        let mut rolling = Self::new(window, min_periods, q);
        values.iter().map(|&v| rolling.update(v)).collect()
    }
}

/// Recursive exponential moving average seeded with the first value
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    alpha: f64,
    current_ema: Option<f64>,
}

impl ExponentialMovingAverage {
    /// Create new EMA with given span (`alpha = 2 / (span + 1)`)
    pub fn new(span: usize) -> Self {
        if span == 0 {
            panic!("Span must be greater than 0");
        }
        Self {
            alpha: 2.0 / (span as f64 + 1.0),
            current_ema: None,
        }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        let ema = match self.current_ema {
            None => value,
            Some(prev_ema) => self.alpha * value + (1.0 - self.alpha) * prev_ema,
        };
        self.current_ema = Some(ema);
        ema
    }

    pub fn compute(span: usize, values: &[f64]) -> Vec<f64> {
        let mut ema = Self::new(span);
        values.iter().map(|&v| ema.update(v)).collect()
    }
}

/// First difference; undefined for the first row
pub fn diff(values: &[f64]) -> Column {
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &value in values {
        out.push(prev.map(|p| value - p));
        prev = Some(value);
    }
    out
}

/// Fractional change over `periods` rows, forward-filling nulls first
///
/// A zero base yields `None` rather than an infinite change.
pub fn pct_change(periods: usize, values: &[Option<f64>]) -> Column {
    let mut filled = Vec::with_capacity(values.len());
    let mut last: Option<f64> = None;
    for value in values {
        if let Some(v) = value.filter(|v| !v.is_nan()) {
            last = Some(v);
        }
        filled.push(last);
    }

    (0..filled.len())
        .map(|t| {
            if t < periods {
                return None;
            }
            match (filled[t - periods], filled[t]) {
                (Some(base), Some(current)) if base != 0.0 => Some(current / base - 1.0),
                _ => None,
            }
        })
        .collect()
}

/// Running maximum up to and including each row
pub fn expanding_max(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut running = f64::NEG_INFINITY;
    for &value in values {
        running = running.max(value);
        out.push(running);
    }
    out
}

/// Running minimum of the non-null values seen so far
pub fn expanding_min(values: &[Option<f64>]) -> Column {
    let mut out = Vec::with_capacity(values.len());
    let mut running: Option<f64> = None;
    for value in values {
        if let Some(v) = value.filter(|v| !v.is_nan()) {
            running = Some(running.map_or(v, |r| r.min(v)));
        }
        out.push(running);
    }
    out
}
