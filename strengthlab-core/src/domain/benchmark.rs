//! BenchmarkSeries — immutable date → close lookup shared by every worker.

use super::record::InstrumentDailyRecord;
use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Benchmark closes keyed by date.
///
/// Constructed once, then only read. There is no mutating API, so a shared
/// reference can be handed to any number of worker threads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkSeries {
    name: String,
    closes: BTreeMap<NaiveDate, f64>,
}

impl BenchmarkSeries {
    /// Build from (date, close) pairs in observation order.
    ///
    /// Duplicate dates collapse to the later-observed value. Non-finite or
    /// non-positive closes are dropped.
    pub fn from_pairs(
        name: impl Into<String>,
        pairs: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        let mut closes = BTreeMap::new();
        for (date, close) in pairs {
            if close.is_finite() && close > 0.0 {
                closes.insert(date, close);
            }
        }
        Self {
            name: name.into(),
            closes,
        }
    }

    /// Build from a standardized benchmark instrument series.
    ///
    /// Fails if no usable close survives.
    pub fn from_records(records: &[InstrumentDailyRecord]) -> CoreResult<Self> {
        let name = records
            .first()
            .map(|r| r.instrument.to_string())
            .unwrap_or_default();
        let series = Self::from_pairs(name, records.iter().map(|r| (r.date, r.close)));
        if series.is_empty() {
            return Err(CoreError::Input(
                "benchmark close series is empty after standardization".into(),
            ));
        }
        Ok(series)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.closes.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.closes.iter().map(|(d, c)| (*d, *c))
    }

    /// Benchmark values aligned to `dates`; NaN where the benchmark has no
    /// observation.
    pub fn aligned(&self, dates: &[NaiveDate]) -> Vec<f64> {
        dates
            .iter()
            .map(|d| self.get(*d).unwrap_or(f64::NAN))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn duplicates_keep_last_observed() {
        let b = BenchmarkSeries::from_pairs("IDX", vec![(d(1), 100.0), (d(2), 101.0), (d(1), 99.0)]);
        assert_eq!(b.len(), 2);
        assert_eq!(b.get(d(1)), Some(99.0));
    }

    #[test]
    fn unusable_closes_are_dropped() {
        let b = BenchmarkSeries::from_pairs("IDX", vec![(d(1), f64::NAN), (d(2), 0.0), (d(3), 5.0)]);
        assert_eq!(b.len(), 1);
        assert_eq!(b.get(d(3)), Some(5.0));
    }

    #[test]
    fn aligned_marks_gaps_as_nan() {
        let b = BenchmarkSeries::from_pairs("IDX", vec![(d(1), 100.0), (d(3), 102.0)]);
        let v = b.aligned(&[d(1), d(2), d(3)]);
        assert_eq!(v[0], 100.0);
        assert!(v[1].is_nan());
        assert_eq!(v[2], 102.0);
    }

    #[test]
    fn from_records_rejects_empty() {
        assert!(BenchmarkSeries::from_records(&[]).is_err());
    }
}
