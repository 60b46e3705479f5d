//! Cross-sectional percentile normalization.
//!
//! For each ranked horizon and each date, the population is the set of rows
//! with a defined raw value. Ties get their average 1-based rank and the
//! percentile is `rank / population * 100`, rounded to two decimals.
//! Undefined raw values stay undefined.

use crate::domain::{RawPanel, UniversePanel};
use std::cmp::Ordering;

/// Percentile ranks of one same-date population.
///
/// Output is positionally aligned with `values`.
pub fn percentile_ranks(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut defined: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();
    let mut out = vec![None; values.len()];
    if defined.is_empty() {
        return out;
    }

    defined.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    let n = defined.len() as f64;

    let mut start = 0;
    while start < defined.len() {
        let mut end = start + 1;
        while end < defined.len() && defined[end].1 == defined[start].1 {
            end += 1;
        }
        // 1-based ranks start+1 ..= end share their mean.
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let pct = round2(avg_rank / n * 100.0);
        for &(i, _) in &defined[start..end] {
            out[i] = Some(pct);
        }
        start = end;
    }
    out
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Replace every raw horizon value with its same-date percentile.
///
/// Consumes the raw panel; ranking only ever sees the complete population.
pub fn normalize(raw: RawPanel) -> UniversePanel {
    let (config, mut rows) = raw.into_parts();
    let horizons = config.mrs_horizons.len();

    // Rows are sorted by (date, instrument), so each date is one run.
    for group in rows.chunk_by_mut(|a, b| a.date() == b.date()) {
        for k in 0..horizons {
            let values: Vec<Option<f64>> = group
                .iter()
                .map(|r| r.mrs.get(k).copied().flatten())
                .collect();
            let ranks = percentile_ranks(&values);
            for (row, rank) in group.iter_mut().zip(ranks) {
                if let Some(slot) = row.mrs.get_mut(k) {
                    *slot = rank;
                }
            }
        }
    }

    tracing::debug!(rows = rows.len(), horizons, "normalized cross-section");
    UniversePanel::from_ranked(config, rows)
}
