//! Per-instrument indicator kernels and the engine that applies them.
//!
//! Kernels implement [`SeriesIndicator`] and work on plain `f64` slices with
//! NaN as the missing marker. [`compute_features`] runs every configured
//! kernel over one instrument's records and converts NaN to `None` when it
//! builds the panel rows.

pub mod config;
pub mod engine;
pub mod indicator;
pub mod mansfield;
pub mod rolling_max;
pub mod sma;

pub use config::{
    IndicatorConfig, MrsHorizon, MANSFIELD_RS_COLUMN, MANSFIELD_RS_SMA_WINDOW, MA_WINDOWS,
    NEW_HIGH_COLUMN, NEW_HIGH_WINDOW_TRADING_DAYS, VMA_WINDOWS,
};
pub use engine::{compute_features, mansfield_series};
pub use indicator::{to_option, SeriesIndicator};
pub use mansfield::{relative_ratio, MansfieldRs};
pub use rolling_max::RollingMax;
pub use sma::{rolling_mean, Sma};

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
