//! Indicator parameters and the column names derived from them.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MA_WINDOWS: [usize; 6] = [5, 10, 20, 60, 120, 200];
pub const VMA_WINDOWS: [usize; 3] = [5, 20, 60];
pub const NEW_HIGH_WINDOW_TRADING_DAYS: usize = 252;
pub const MANSFIELD_RS_SMA_WINDOW: usize = 200;

pub const MANSFIELD_RS_COLUMN: &str = "MansfieldRS";
pub const NEW_HIGH_COLUMN: &str = "IsNewHigh1Y";

/// An additional relative-strength horizon that is cross-sectionally ranked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrsHorizon {
    /// Output column name, e.g. `MRS_20`.
    pub name: String,
    /// Trailing window of the ratio average.
    pub window: usize,
}

impl MrsHorizon {
    pub fn new(name: impl Into<String>, window: usize) -> Self {
        Self {
            name: name.into(),
            window,
        }
    }

    /// Column name while the value is still a raw Mansfield reading.
    pub fn raw_column(&self) -> String {
        format!("{}_raw", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Close moving-average windows (`SMA_<w>`).
    pub ma_windows: Vec<usize>,
    /// Volume moving-average windows (`VMA_<w>`).
    pub vma_windows: Vec<usize>,
    /// Canonical Mansfield RS horizon (`MansfieldRS`).
    pub mansfield_window: usize,
    /// Extra horizons produced raw, then replaced by percentiles.
    pub mrs_horizons: Vec<MrsHorizon>,
    /// Rolling-max window of the new-high flag.
    pub new_high_window: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_windows: MA_WINDOWS.to_vec(),
            vma_windows: VMA_WINDOWS.to_vec(),
            mansfield_window: MANSFIELD_RS_SMA_WINDOW,
            mrs_horizons: vec![
                MrsHorizon::new("MRS_20", 20),
                MrsHorizon::new("MRS_60", 60),
                MrsHorizon::new("MRS_120", 120),
            ],
            new_high_window: NEW_HIGH_WINDOW_TRADING_DAYS,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> CoreResult<()> {
        let zero_window = self
            .ma_windows
            .iter()
            .chain(self.vma_windows.iter())
            .chain(self.mrs_horizons.iter().map(|h| &h.window))
            .chain([self.mansfield_window, self.new_high_window].iter())
            .any(|w| *w == 0);
        if zero_window {
            return Err(CoreError::Computation("indicator windows must be >= 1".into()));
        }

        let mut seen = HashSet::new();
        for h in &self.mrs_horizons {
            if h.name.trim().is_empty() {
                return Err(CoreError::Computation("MRS horizon name is empty".into()));
            }
            if !seen.insert(h.name.as_str()) {
                return Err(CoreError::Computation(format!(
                    "duplicate MRS horizon name '{}'",
                    h.name
                )));
            }
        }
        Ok(())
    }

    pub fn sma_columns(&self) -> Vec<String> {
        self.ma_windows.iter().map(|w| format!("SMA_{w}")).collect()
    }

    pub fn vma_columns(&self) -> Vec<String> {
        self.vma_windows.iter().map(|w| format!("VMA_{w}")).collect()
    }

    pub fn mrs_columns(&self) -> Vec<String> {
        self.mrs_horizons.iter().map(|h| h.name.clone()).collect()
    }

    pub fn mrs_raw_columns(&self) -> Vec<String> {
        self.mrs_horizons.iter().map(MrsHorizon::raw_column).collect()
    }

    /// Feature names in output order (after cross-sectional ranking).
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.sma_columns();
        names.extend(self.vma_columns());
        names.push(MANSFIELD_RS_COLUMN.to_string());
        names.push(NEW_HIGH_COLUMN.to_string());
        names.extend(self.mrs_columns());
        names
    }
}
