//! Indicator panel rows and the two panel stages.
//!
//! `RawPanel` holds raw multi-horizon Mansfield readings. The only way to get
//! a `UniversePanel` is to pass a `RawPanel` through
//! [`crate::cross_section::normalize`], so percentile columns can never be
//! built from a partially assembled universe.

use super::ids::InstrumentId;
use super::record::InstrumentDailyRecord;
use crate::error::{CoreError, CoreResult};
use crate::indicators::IndicatorConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Record columns, in output order, ahead of the indicator columns.
pub const RECORD_COLUMNS: [&str; 9] = [
    "Date",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "TradingValue",
    "ChangePct",
    "InstrumentId",
];

/// One instrument-date with its indicator columns.
///
/// Vectors are positionally aligned with the owning panel's
/// [`IndicatorConfig`]: `sma` with `ma_windows`, `vma` with `vma_windows`,
/// `mrs` with `mrs_horizons`. `None` means unknown/undefined, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPanelRow {
    pub record: InstrumentDailyRecord,
    pub sma: Vec<Option<f64>>,
    pub vma: Vec<Option<f64>>,
    pub mansfield_rs: Option<f64>,
    /// Raw Mansfield values in a `RawPanel`, percentiles in a `UniversePanel`.
    pub mrs: Vec<Option<f64>>,
    pub is_new_high_1y: Option<bool>,
}

impl IndicatorPanelRow {
    pub fn instrument(&self) -> &InstrumentId {
        &self.record.instrument
    }

    pub fn date(&self) -> NaiveDate {
        self.record.date
    }

    pub fn close(&self) -> f64 {
        self.record.close
    }
}

/// Assembled universe before cross-sectional ranking.
#[derive(Debug, Clone)]
pub struct RawPanel {
    config: IndicatorConfig,
    rows: Vec<IndicatorPanelRow>,
}

impl RawPanel {
    /// Concatenate per-instrument outputs and sort by (date, instrument).
    ///
    /// The result does not depend on the order of `frames`.
    pub fn assemble(
        config: IndicatorConfig,
        frames: impl IntoIterator<Item = Vec<IndicatorPanelRow>>,
    ) -> CoreResult<Self> {
        let mut rows: Vec<IndicatorPanelRow> = frames.into_iter().flatten().collect();
        if rows.is_empty() {
            return Err(CoreError::Input("no feature frames produced".into()));
        }

        rows.sort_by(|a, b| {
            a.date()
                .cmp(&b.date())
                .then_with(|| a.instrument().cmp(b.instrument()))
        });

        if let Some(w) = rows
            .windows(2)
            .find(|w| w[0].date() == w[1].date() && w[0].instrument() == w[1].instrument())
        {
            return Err(CoreError::Input(format!(
                "duplicate panel row for {} on {}",
                w[0].instrument(),
                w[0].date()
            )));
        }

        Ok(Self { config, rows })
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn rows(&self) -> &[IndicatorPanelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names with the `_raw` suffix on the ranked horizons.
    pub fn columns(&self) -> Vec<String> {
        panel_columns(&self.config, self.config.mrs_raw_columns())
    }

    pub(crate) fn into_parts(self) -> (IndicatorConfig, Vec<IndicatorPanelRow>) {
        (self.config, self.rows)
    }
}

/// Final universe panel: percentile columns replace the raw ones.
#[derive(Debug, Clone)]
pub struct UniversePanel {
    config: IndicatorConfig,
    rows: Vec<IndicatorPanelRow>,
}

impl UniversePanel {
    pub(crate) fn from_ranked(config: IndicatorConfig, rows: Vec<IndicatorPanelRow>) -> Self {
        Self { config, rows }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn rows(&self) -> &[IndicatorPanelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> Vec<String> {
        panel_columns(&self.config, self.config.mrs_columns())
    }

    /// Sorted union of every trading date present in the panel.
    pub fn date_grid(&self) -> Vec<NaiveDate> {
        self.rows
            .iter()
            .map(|r| r.date())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct instruments, sorted.
    pub fn instruments(&self) -> Vec<InstrumentId> {
        self.rows
            .iter()
            .map(|r| r.instrument().clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Deterministic BLAKE3 hash over every row, in panel order.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for row in &self.rows {
            let r = &row.record;
            hasher.update(r.instrument.as_str().as_bytes());
            hasher.update(r.date.to_string().as_bytes());
            for v in [r.open, r.high, r.low, r.close, r.volume] {
                hasher.update(&v.to_le_bytes());
            }
            let optional = row
                .sma
                .iter()
                .chain(row.vma.iter())
                .chain(std::iter::once(&row.mansfield_rs))
                .chain(row.mrs.iter());
            for v in optional {
                match v {
                    Some(x) => hasher.update(&x.to_le_bytes()),
                    None => hasher.update(b"null"),
                };
            }
            hasher.update(&[row.is_new_high_1y.map_or(2u8, u8::from)]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn panel_columns(config: &IndicatorConfig, mrs_columns: Vec<String>) -> Vec<String> {
    let mut cols: Vec<String> = RECORD_COLUMNS.iter().map(|c| c.to_string()).collect();
    cols.extend(config.sma_columns());
    cols.extend(config.vma_columns());
    cols.push(crate::indicators::MANSFIELD_RS_COLUMN.to_string());
    cols.push(crate::indicators::NEW_HIGH_COLUMN.to_string());
    cols.extend(mrs_columns);
    cols
}
