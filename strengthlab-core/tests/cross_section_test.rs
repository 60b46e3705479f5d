//! Cross-sectional normalization over assembled panels.

use chrono::{Datelike, NaiveDate};
use proptest::prelude::*;
use strengthlab_core::cross_section::{normalize, percentile_ranks};
use strengthlab_core::domain::{IndicatorPanelRow, InstrumentDailyRecord, InstrumentId, RawPanel};
use strengthlab_core::indicators::{IndicatorConfig, MrsHorizon};

fn config() -> IndicatorConfig {
    IndicatorConfig {
        mrs_horizons: vec![MrsHorizon::new("MRS_20", 20)],
        ..IndicatorConfig::default()
    }
}

fn row(id: &str, day: u32, raw: Option<f64>) -> IndicatorPanelRow {
    IndicatorPanelRow {
        record: InstrumentDailyRecord {
            instrument: InstrumentId::new(id),
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
            trading_value: None,
            change_pct: None,
        },
        sma: vec![None; 6],
        vma: vec![None; 3],
        mansfield_rs: None,
        mrs: vec![raw],
        is_new_high_1y: None,
    }
}

#[test]
fn three_instruments_one_date_preserve_order() {
    let raw = RawPanel::assemble(
        config(),
        vec![
            vec![row("C", 3, Some(5.0))],
            vec![row("A", 3, Some(-2.0))],
            vec![row("B", 3, Some(1.5))],
        ],
    )
    .unwrap();
    let panel = normalize(raw);

    let by_id: Vec<(&str, f64)> = panel
        .rows()
        .iter()
        .map(|r| (r.instrument().as_str(), r.mrs[0].unwrap()))
        .collect();
    assert_eq!(by_id, vec![("A", 33.33), ("B", 66.67), ("C", 100.0)]);
    assert_eq!(panel.columns().last().map(String::as_str), Some("MRS_20"));
}

#[test]
fn ranks_are_independent_per_date() {
    let raw = RawPanel::assemble(
        config(),
        vec![
            vec![row("A", 3, Some(1.0)), row("A", 4, Some(9.0))],
            vec![row("B", 3, Some(2.0)), row("B", 4, Some(3.0))],
            vec![row("C", 4, None)],
        ],
    )
    .unwrap();
    let panel = normalize(raw);
    let get = |id: &str, day: u32| {
        panel
            .rows()
            .iter()
            .find(|r| r.instrument().as_str() == id && r.date().day() == day)
            .and_then(|r| r.mrs[0])
    };
    assert_eq!(get("A", 3), Some(50.0));
    assert_eq!(get("B", 3), Some(100.0));
    assert_eq!(get("A", 4), Some(100.0));
    assert_eq!(get("B", 4), Some(50.0));
    assert_eq!(get("C", 4), None);
}

proptest! {
    #[test]
    fn percentiles_lie_in_range_and_max_maps_to_hundred(
        values in prop::collection::hash_set(-1_000_000i64..1_000_000, 1..200),
    ) {
        let values: Vec<Option<f64>> = values.into_iter().map(|v| Some(v as f64 / 100.0)).collect();
        let ranks = percentile_ranks(&values);

        for r in ranks.iter() {
            let r = r.unwrap();
            prop_assert!((0.0..=100.0).contains(&r));
        }
        let max_idx = values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        prop_assert_eq!(ranks[max_idx], Some(100.0));
    }

    #[test]
    fn ranking_preserves_order(
        values in prop::collection::vec(-100.0..100.0_f64, 2..100),
    ) {
        let opts: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
        let ranks = percentile_ranks(&opts);
        for i in 0..values.len() {
            for j in 0..values.len() {
                if values[i] < values[j] {
                    prop_assert!(ranks[i].unwrap() <= ranks[j].unwrap());
                }
            }
        }
    }
}
