//! Property and scenario tests for the per-instrument indicator engine.
//!
//! 1. Moving-average coverage: a w-window average is defined on exactly L-w+1 rows
//! 2. Relative strength is invariant to a common rescaling of instrument and benchmark
//! 3. Monotone series against a flat benchmark (260 rows)

use chrono::NaiveDate;
use proptest::prelude::*;
use strengthlab_core::domain::{BenchmarkSeries, InstrumentDailyRecord, InstrumentId};
use strengthlab_core::indicators::{compute_features, IndicatorConfig, MrsHorizon};

fn records(id: &str, closes: &[f64]) -> Vec<InstrumentDailyRecord> {
    let base = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
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
            volume: 1_000.0 + i as f64,
            trading_value: None,
            change_pct: None,
        })
        .collect()
}

fn benchmark(recs: &[InstrumentDailyRecord], values: &[f64]) -> BenchmarkSeries {
    BenchmarkSeries::from_pairs("BENCH", recs.iter().zip(values).map(|(r, v)| (r.date, *v)))
}

fn compact_config(window: usize) -> IndicatorConfig {
    IndicatorConfig {
        ma_windows: vec![window],
        vma_windows: vec![window],
        mansfield_window: window,
        mrs_horizons: vec![MrsHorizon::new("MRS_A", window), MrsHorizon::new("MRS_B", 2)],
        new_high_window: window,
    }
}

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..500.0_f64, 1..80)
}

// ── 1. Moving-average coverage ───────────────────────────────────────

proptest! {
    #[test]
    fn moving_average_defined_on_trailing_positions(
        closes in arb_closes(),
        window in 1usize..40,
    ) {
        let recs = records("P", &closes);
        let rows = compute_features(&recs, None, &compact_config(window)).unwrap();
        let len = closes.len();

        let defined = rows.iter().filter(|r| r.sma[0].is_some()).count();
        let expected = if window <= len { len - window + 1 } else { 0 };
        prop_assert_eq!(defined, expected);
        for (i, row) in rows.iter().enumerate() {
            prop_assert_eq!(row.sma[0].is_some(), i + 1 >= window);
        }
    }
}

// ── 2. Scale invariance ──────────────────────────────────────────────

proptest! {
    #[test]
    fn relative_strength_is_scale_invariant(
        pairs in prop::collection::vec((1.0..500.0_f64, 50.0..150.0_f64), 5..60),
        scale in 0.01..1000.0_f64,
    ) {
        let closes: Vec<f64> = pairs.iter().map(|p| p.0).collect();
        let bench: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        let cfg = compact_config(4);

        let base_recs = records("S", &closes);
        let base = compute_features(&base_recs, Some(&benchmark(&base_recs, &bench)), &cfg).unwrap();

        let scaled_closes: Vec<f64> = closes.iter().map(|c| c * scale).collect();
        let scaled_bench: Vec<f64> = bench.iter().map(|b| b * scale).collect();
        let scaled_recs = records("S", &scaled_closes);
        let scaled =
            compute_features(&scaled_recs, Some(&benchmark(&scaled_recs, &scaled_bench)), &cfg).unwrap();

        for (a, b) in base.iter().zip(scaled.iter()) {
            let pairs = std::iter::once((a.mansfield_rs, b.mansfield_rs))
                .chain(a.mrs.iter().copied().zip(b.mrs.iter().copied()));
            for (x, y) in pairs {
                match (x, y) {
                    (Some(x), Some(y)) => {
                        prop_assert!((x - y).abs() <= 1e-6 * (1.0 + x.abs()), "{} vs {}", x, y)
                    }
                    (None, None) => {}
                    other => prop_assert!(false, "definedness differs: {:?}", other),
                }
            }
        }
    }
}

// ── 3. Monotone series against a flat benchmark ──────────────────────

#[test]
fn monotone_series_against_flat_benchmark() {
    let closes: Vec<f64> = (1..=260).map(|i| i as f64).collect();
    let recs = records("000001", &closes);
    let bench = benchmark(&recs, &[100.0; 260]);
    let rows = compute_features(&recs, Some(&bench), &IndicatorConfig::default()).unwrap();

    assert_eq!(rows.len(), 260);
    for row in rows.iter().take(4) {
        assert_eq!(row.sma[0], None);
    }
    for i in 4..260 {
        let expected = closes[i - 4..=i].iter().sum::<f64>() / 5.0;
        let actual = rows[i].sma[0].unwrap();
        assert!((actual - expected).abs() < 1e-9, "SMA_5 at {i}: {actual} vs {expected}");
    }

    assert_eq!(rows[259].is_new_high_1y, Some(true));
    assert_eq!(rows[250].is_new_high_1y, None);

    // Rising ratio over a flat benchmark sits above its own average.
    assert!(rows[259].mansfield_rs.unwrap() > 0.0);
    assert_eq!(rows[198].mansfield_rs, None);
    assert!(rows[259].mrs.iter().all(|v| v.unwrap() > 0.0));
}

#[test]
fn volume_average_uses_volume_column() {
    let recs = records("V", &[10.0; 6]);
    let rows = compute_features(&recs, None, &compact_config(2)).unwrap();
    // volumes are 1000, 1001, ...
    assert_eq!(rows[1].vma[0], Some(1000.5));
    assert_eq!(rows[0].vma[0], None);
}
