//! Equal-weight index construction.
//!
//! Daily simple returns are taken within each instrument's own series, then
//! averaged without weights across whatever constituents report that day.
//! The averaged return is re-indexed onto the global date grid (gaps become
//! a 0.0 return with no constituents) and compounded from base 100.

use crate::domain::{BenchmarkSeries, IndicatorPanelRow, InstrumentId, UniversePanel};
use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

pub const INDEX_BASE: f64 = 100.0;

/// Name of the synthetic universe benchmark.
pub const UNIVERSE_BENCHMARK_NAME: &str = "UniverseClose";

/// Running return sum and count for one (bucket, date).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct ReturnAccumulator {
    sum: f64,
    count: usize,
}

impl ReturnAccumulator {
    pub(crate) fn push(&mut self, ret: f64) {
        self.sum += ret;
        self.count += 1;
    }

    pub(crate) fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }
}

/// One re-indexed point of an equal-weight index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub ret: f64,
    pub count: usize,
}

/// Simple returns per instrument, keyed by instrument id.
///
/// Iteration over the result is ordered by id, so downstream sums do not
/// depend on the order the panel rows arrive in.
pub(crate) fn instrument_returns<'a>(
    rows: impl IntoIterator<Item = &'a IndicatorPanelRow>,
) -> BTreeMap<InstrumentId, Vec<(NaiveDate, f64)>> {
    let mut closes: BTreeMap<InstrumentId, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for row in rows {
        closes
            .entry(row.instrument().clone())
            .or_default()
            .push((row.date(), row.close()));
    }

    closes
        .into_iter()
        .map(|(id, mut series)| {
            series.sort_by_key(|(d, _)| *d);
            let returns = series
                .windows(2)
                .filter_map(|w| {
                    let (prev, (date, close)) = (w[0].1, w[1]);
                    let r = close / prev - 1.0;
                    r.is_finite().then_some((date, r))
                })
                .collect();
            (id, returns)
        })
        .collect()
}

/// Re-index accumulated returns onto `grid` and compound from base 100.
pub(crate) fn compound_on_grid(
    by_date: &HashMap<NaiveDate, ReturnAccumulator>,
    grid: &[NaiveDate],
) -> Vec<IndexPoint> {
    let mut level = INDEX_BASE;
    grid.iter()
        .map(|&date| {
            let acc = by_date.get(&date).copied().unwrap_or_default();
            let ret = acc.mean().unwrap_or(0.0);
            level *= 1.0 + ret;
            IndexPoint {
                date,
                close: level,
                ret,
                count: acc.count(),
            }
        })
        .collect()
}

/// Equal-weight index across every instrument in the panel, base 100 on the
/// grid's first date.
pub fn equal_weight_universe_benchmark(
    panel: &UniversePanel,
    grid: &[NaiveDate],
) -> CoreResult<BenchmarkSeries> {
    if panel.is_empty() {
        return Err(CoreError::Aggregation("panel is empty".into()));
    }
    if grid.is_empty() {
        return Err(CoreError::Aggregation("date grid is empty".into()));
    }

    let mut by_date: HashMap<NaiveDate, ReturnAccumulator> = HashMap::new();
    for returns in instrument_returns(panel.rows()).into_values() {
        for (date, r) in returns {
            by_date.entry(date).or_default().push(r);
        }
    }

    let points = compound_on_grid(&by_date, grid);
    Ok(BenchmarkSeries::from_pairs(
        UNIVERSE_BENCHMARK_NAME,
        points.into_iter().map(|p| (p.date, p.close)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn accumulator_mean() {
        let mut acc = ReturnAccumulator::default();
        assert_eq!(acc.mean(), None);
        acc.push(0.1);
        acc.push(0.3);
        assert!((acc.mean().unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(acc.count(), 2);
    }

    #[test]
    fn gaps_compound_as_flat() {
        let mut by_date = HashMap::new();
        let mut acc = ReturnAccumulator::default();
        acc.push(0.10);
        by_date.insert(d(3), acc);
        let points = compound_on_grid(&by_date, &[d(1), d(2), d(3), d(4)]);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].close, 100.0);
        assert_eq!(points[1].count, 0);
        assert!((points[2].close - 110.0).abs() < 1e-9);
        assert!((points[3].close - 110.0).abs() < 1e-9);
        assert_eq!(points[3].ret, 0.0);
    }
}
