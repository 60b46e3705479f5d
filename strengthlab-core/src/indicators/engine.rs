//! Per-instrument indicator engine.

use super::config::{IndicatorConfig, MANSFIELD_RS_COLUMN};
use super::indicator::{to_option, SeriesIndicator};
use super::mansfield::{relative_ratio, MansfieldRs};
use super::rolling_max::RollingMax;
use super::sma::Sma;
use crate::domain::{check_series, BenchmarkSeries, IndicatorPanelRow, InstrumentDailyRecord};
use crate::error::CoreResult;
use chrono::NaiveDate;

/// Mansfield RS of `values` against an already date-aligned benchmark.
///
/// Shared by the instrument engine and the industry engine so both use the
/// same formula.
pub fn mansfield_series(
    values: &[f64],
    aligned_benchmark: &[f64],
    window: usize,
    name: &str,
) -> Vec<f64> {
    let ratio = relative_ratio(values, aligned_benchmark);
    MansfieldRs::new(window, name).compute(&ratio)
}

/// Compute every configured indicator for one instrument.
///
/// Records are sorted by date first; the series must then satisfy
/// [`check_series`]. Without a benchmark (or with an empty one) every
/// relative-strength value is `None`.
pub fn compute_features(
    records: &[InstrumentDailyRecord],
    benchmark: Option<&BenchmarkSeries>,
    config: &IndicatorConfig,
) -> CoreResult<Vec<IndicatorPanelRow>> {
    config.validate()?;

    let mut records = records.to_vec();
    records.sort_by_key(|r| r.date);
    check_series(&records)?;

    let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
    let closes: Vec<f64> = records.iter().map(|r| r.close).collect();
    let volumes: Vec<f64> = records.iter().map(|r| r.volume).collect();

    let sma: Vec<Vec<f64>> = config
        .ma_windows
        .iter()
        .map(|&w| Sma::new(w).compute(&closes))
        .collect();
    let vma: Vec<Vec<f64>> = config
        .vma_windows
        .iter()
        .map(|&w| Sma::named(w, format!("VMA_{w}")).compute(&volumes))
        .collect();

    let aligned = benchmark
        .filter(|b| !b.is_empty())
        .map(|b| b.aligned(&dates));
    let mansfield = aligned.as_ref().map(|bench| {
        mansfield_series(&closes, bench, config.mansfield_window, MANSFIELD_RS_COLUMN)
    });
    let mrs: Vec<Option<Vec<f64>>> = config
        .mrs_horizons
        .iter()
        .map(|h| {
            aligned
                .as_ref()
                .map(|bench| mansfield_series(&closes, bench, h.window, &h.raw_column()))
        })
        .collect();

    let rolling_max = RollingMax::new(config.new_high_window).compute(&closes);

    let rows: Vec<IndicatorPanelRow> = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let is_new_high_1y = if rolling_max[i].is_nan() {
                None
            } else {
                Some(record.close >= rolling_max[i])
            };
            IndicatorPanelRow {
                sma: sma.iter().map(|s| to_option(s[i])).collect(),
                vma: vma.iter().map(|s| to_option(s[i])).collect(),
                mansfield_rs: mansfield.as_ref().and_then(|s| to_option(s[i])),
                mrs: mrs
                    .iter()
                    .map(|s| s.as_ref().and_then(|s| to_option(s[i])))
                    .collect(),
                is_new_high_1y,
                record,
            }
        })
        .collect();

    if let Some(first) = rows.first() {
        tracing::debug!(
            instrument = %first.instrument(),
            rows = rows.len(),
            benchmark = aligned.is_some(),
            "computed features"
        );
    }

    Ok(rows)
}
