//! Industry daily frame for one taxonomy level.

use super::index::{compound_on_grid, instrument_returns, ReturnAccumulator};
use super::membership::IndustryMembership;
use crate::cross_section::percentile_ranks;
use crate::domain::{BenchmarkSeries, IndustryKey, IndustryLevel, UniversePanel};
use crate::error::{CoreError, CoreResult};
use crate::indicators::{mansfield_series, to_option, IndicatorConfig, MANSFIELD_RS_COLUMN};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Column names of an industry table, in output order.
pub fn industry_columns(config: &IndicatorConfig) -> Vec<String> {
    let mut cols: Vec<String> = [
        "Date",
        "Level",
        "IndustryLarge",
        "IndustryMid",
        "IndustrySmall",
        "IndustryKey",
        "IndustryClose",
        "IndustryReturn",
        "ConstituentCount",
        MANSFIELD_RS_COLUMN,
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    cols.extend(config.mrs_columns());
    cols
}

/// One (level, key, date) row of an equal-weight industry index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryDailyRow {
    pub level: IndustryLevel,
    pub key: IndustryKey,
    pub large: String,
    /// `""` at level L.
    pub mid: String,
    /// `""` at levels L and LM.
    pub small: String,
    pub date: NaiveDate,
    pub industry_close: f64,
    pub industry_return: f64,
    pub constituent_count: usize,
    pub mansfield_rs: Option<f64>,
    /// Per-date percentile within the level, aligned with the configured
    /// horizons.
    pub mrs: Vec<Option<f64>>,
}

/// Build the industry frame for `level` on `grid`.
///
/// Output holds exactly one row per (key, grid date), sorted by
/// (large, mid, small, date).
pub fn compute_industry_frame(
    panel: &UniversePanel,
    membership: &IndustryMembership,
    benchmark: Option<&BenchmarkSeries>,
    level: IndustryLevel,
    grid: &[NaiveDate],
    config: &IndicatorConfig,
) -> CoreResult<Vec<IndustryDailyRow>> {
    if panel.is_empty() {
        return Err(CoreError::Aggregation("panel is empty".into()));
    }
    if grid.is_empty() {
        return Err(CoreError::Aggregation("date grid is empty".into()));
    }

    // Every joined instrument registers its key, even with a single row and
    // therefore no returns.
    let mut buckets: BTreeMap<IndustryKey, HashMap<NaiveDate, ReturnAccumulator>> =
        BTreeMap::new();
    let mut returns = instrument_returns(panel.rows());
    for id in panel.instruments() {
        let Some(entry) = membership.resolve(&id) else {
            continue;
        };
        let bucket = buckets
            .entry(IndustryKey::for_level(&entry, level))
            .or_default();
        for (date, r) in returns.remove(&id).unwrap_or_default() {
            bucket.entry(date).or_default().push(r);
        }
    }
    if buckets.is_empty() {
        return Err(CoreError::Aggregation(format!(
            "no industry keys at level {level}"
        )));
    }

    let aligned = benchmark
        .filter(|b| !b.is_empty())
        .map(|b| b.aligned(grid));

    let mut rows = Vec::with_capacity(buckets.len() * grid.len());
    for (key, by_date) in buckets {
        let points = compound_on_grid(&by_date, grid);
        let closes: Vec<f64> = points.iter().map(|p| p.close).collect();
        let mansfield = aligned.as_ref().map(|bench| {
            mansfield_series(&closes, bench, config.mansfield_window, MANSFIELD_RS_COLUMN)
        });
        let horizons: Vec<Option<Vec<f64>>> = config
            .mrs_horizons
            .iter()
            .map(|h| {
                aligned
                    .as_ref()
                    .map(|bench| mansfield_series(&closes, bench, h.window, &h.raw_column()))
            })
            .collect();

        let (large, mid, small) = key.labels();
        for (i, p) in points.iter().enumerate() {
            rows.push(IndustryDailyRow {
                level,
                key: key.clone(),
                large: large.clone(),
                mid: mid.clone(),
                small: small.clone(),
                date: p.date,
                industry_close: p.close,
                industry_return: p.ret,
                constituent_count: p.count,
                mansfield_rs: mansfield.as_ref().and_then(|s| to_option(s[i])),
                mrs: horizons
                    .iter()
                    .map(|s| s.as_ref().and_then(|s| to_option(s[i])))
                    .collect(),
            });
        }
    }

    rank_industry_horizons(&mut rows, config.mrs_horizons.len());

    rows.sort_by(|a, b| {
        (&a.large, &a.mid, &a.small, a.date).cmp(&(&b.large, &b.mid, &b.small, b.date))
    });

    tracing::debug!(%level, rows = rows.len(), "computed industry frame");
    Ok(rows)
}

/// Replace raw horizon values with per-date percentiles across the level's
/// keys.
fn rank_industry_horizons(rows: &mut [IndustryDailyRow], horizons: usize) {
    let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        by_date.entry(row.date).or_default().push(i);
    }

    for indices in by_date.values() {
        for k in 0..horizons {
            let values: Vec<Option<f64>> = indices
                .iter()
                .map(|&i| rows[i].mrs.get(k).copied().flatten())
                .collect();
            for (&i, rank) in indices.iter().zip(percentile_ranks(&values)) {
                if let Some(slot) = rows[i].mrs.get_mut(k) {
                    *slot = rank;
                }
            }
        }
    }
}

/// Concatenate every requested level, sorted by (level, large, mid, small,
/// date).
pub fn compute_industry_levels(
    panel: &UniversePanel,
    membership: &IndustryMembership,
    benchmark: Option<&BenchmarkSeries>,
    levels: &[IndustryLevel],
    grid: &[NaiveDate],
    config: &IndicatorConfig,
) -> CoreResult<Vec<IndustryDailyRow>> {
    let mut sorted = levels.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut out = Vec::new();
    for level in sorted {
        out.extend(compute_industry_frame(
            panel, membership, benchmark, level, grid, config,
        )?);
    }
    Ok(out)
}
