//! Trailing rolling maximum (inclusive of the current value).
//!
//! Monotonic-deque implementation, O(n) regardless of window size.
//! Any NaN inside the window yields NaN.

use super::indicator::SeriesIndicator;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingMax {
    period: usize,
    name: String,
}

impl RollingMax {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "rolling max period must be >= 1");
        Self {
            period,
            name: format!("MAX_{period}"),
        }
    }
}

impl SeriesIndicator for RollingMax {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let mut result = vec![f64::NAN; n];
        let mut window: VecDeque<usize> = VecDeque::with_capacity(self.period);
        let mut last_nan: Option<usize> = None;

        for (i, &v) in values.iter().enumerate() {
            if v.is_nan() {
                last_nan = Some(i);
            } else {
                while window.back().is_some_and(|&j| values[j] <= v) {
                    window.pop_back();
                }
                window.push_back(i);
            }
            while window.front().is_some_and(|&j| j + self.period <= i) {
                window.pop_front();
            }

            if i + 1 < self.period {
                continue;
            }
            if last_nan.is_some_and(|j| j + self.period > i) {
                continue;
            }
            if let Some(&j) = window.front() {
                result[i] = values[j];
            }
        }

        result
    }
}
