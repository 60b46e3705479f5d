//! Series indicator trait.
//!
//! Indicators are pure functions: one numeric series in, one numeric series
//! of the same length out. NaN marks "not defined here" (warmup or a missing
//! input inside the window).

/// Trait for rolling-window indicators over a single `f64` series.
///
/// # Look-ahead guard
/// The value at index t may depend only on inputs at indices <= t.
pub trait SeriesIndicator: Send + Sync {
    /// Column-style name (e.g. "SMA_20").
    fn name(&self) -> &str;

    /// Number of leading positions that are always NaN.
    fn lookback(&self) -> usize;

    /// Compute over the full series. Output length equals input length.
    fn compute(&self, values: &[f64]) -> Vec<f64>;
}

/// NaN → `None`, anything finite → `Some`.
#[inline]
pub fn to_option(v: f64) -> Option<f64> {
    if v.is_finite() {
        Some(v)
    } else {
        None
    }
}
