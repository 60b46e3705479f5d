//! InstrumentDailyRecord — the canonical per-instrument daily unit.

use super::ids::InstrumentId;
use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One standardized trading day for one instrument.
///
/// Prices are whatever the feed delivered for the requested adjustment mode.
/// `trading_value` and `change_pct` are optional because not every feed
/// reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentDailyRecord {
    pub instrument: InstrumentId,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trading_value: Option<f64>,
    pub change_pct: Option<f64>,
}

impl InstrumentDailyRecord {
    /// Close must be a finite, strictly positive number.
    pub fn has_usable_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// Check the per-instrument series invariants: non-empty, one instrument,
/// usable closes, and strictly increasing dates.
pub fn check_series(records: &[InstrumentDailyRecord]) -> CoreResult<()> {
    let first = records
        .first()
        .ok_or_else(|| CoreError::Input("series is empty".into()))?;

    let mut prev: Option<NaiveDate> = None;
    for r in records {
        if r.instrument != first.instrument {
            return Err(CoreError::Input(format!(
                "series mixes instruments {} and {}",
                first.instrument, r.instrument
            )));
        }
        if !r.has_usable_close() {
            return Err(CoreError::Input(format!(
                "non-numeric or non-positive Close {} on {} for {}",
                r.close, r.date, r.instrument
            )));
        }
        if let Some(p) = prev {
            if r.date <= p {
                return Err(CoreError::Input(format!(
                    "dates not strictly increasing for {}: {} after {}",
                    r.instrument, r.date, p
                )));
            }
        }
        prev = Some(r.date);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn make_records(id: &str, closes: &[f64]) -> Vec<InstrumentDailyRecord> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| InstrumentDailyRecord {
            instrument: InstrumentId::new(id),
            date: base + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
            trading_value: None,
            change_pct: None,
        })
        .collect()
}
