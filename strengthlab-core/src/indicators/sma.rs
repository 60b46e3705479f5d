//! Simple Moving Average (SMA).
//!
//! Trailing mean over exactly `period` values. No partial windows: the first
//! valid value is at index period-1. Any NaN inside the window yields NaN.

use super::indicator::SeriesIndicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self::named(period, format!("SMA_{period}"))
    }

    /// Same kernel under a different column name (e.g. `VMA_20`).
    pub fn named(period: usize, name: impl Into<String>) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: name.into(),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl SeriesIndicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        rolling_mean(values, self.period)
    }
}

/// Trailing mean with NaN propagation.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let mut sum = 0.0;
    let mut nan_in_window = false;
    for v in values.iter().take(period) {
        if v.is_nan() {
            nan_in_window = true;
        }
        sum += v;
    }

    if !nan_in_window {
        result[period - 1] = sum / period as f64;
    }

    for i in period..n {
        let leaving = values[i - period];
        let entering = values[i];
        sum = sum - leaving + entering;

        // A NaN poisons the running sum, so rescan the window whenever one
        // enters, leaves, or is still inside.
        if entering.is_nan() || leaving.is_nan() || nan_in_window {
            nan_in_window = false;
            sum = 0.0;
            for v in &values[(i + 1 - period)..=i] {
                if v.is_nan() {
                    nan_in_window = true;
                }
                sum += v;
            }
            if nan_in_window {
                continue;
            }
        }

        result[i] = sum / period as f64;
    }

    result
}
