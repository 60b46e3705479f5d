//! Mansfield Relative Strength.
//!
//! ratio[t] = close[t] / benchmark[t]
//! MRS[t]   = (ratio[t] / SMA_h(ratio)[t] - 1) * 100
//!
//! The SMA needs a full window of defined ratios; a missing benchmark value
//! makes that day's ratio missing and poisons every window containing it.

use super::indicator::SeriesIndicator;
use super::sma::rolling_mean;

/// Mansfield RS over a precomputed ratio series.
#[derive(Debug, Clone)]
pub struct MansfieldRs {
    window: usize,
    name: String,
}

impl MansfieldRs {
    pub fn new(window: usize, name: impl Into<String>) -> Self {
        assert!(window >= 1, "Mansfield RS window must be >= 1");
        Self {
            window,
            name: name.into(),
        }
    }
}

impl SeriesIndicator for MansfieldRs {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window.saturating_sub(1)
    }

    /// `values` is the relative ratio series, not raw closes.
    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let avg = rolling_mean(values, self.window);
        values
            .iter()
            .zip(avg.iter())
            .map(|(r, a)| (r / a - 1.0) * 100.0)
            .map(|v| if v.is_finite() { v } else { f64::NAN })
            .collect()
    }
}

/// close / benchmark, element-wise. NaN wherever either side is missing
/// or the benchmark is not positive.
pub fn relative_ratio(closes: &[f64], benchmark: &[f64]) -> Vec<f64> {
    closes
        .iter()
        .zip(benchmark.iter())
        .map(|(c, b)| {
            if c.is_finite() && b.is_finite() && *b > 0.0 {
                c / b
            } else {
                f64::NAN
            }
        })
        .collect()
}
