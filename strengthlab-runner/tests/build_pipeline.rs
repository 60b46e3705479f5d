//! Integration tests for the build orchestrator over the synthetic feed.
//!
//! Covers fail-fast behavior (no artifacts on failure), determinism across
//! worker counts, and the shape of a successful build.

use chrono::NaiveDate;
use polars::prelude::*;
use strengthlab_core::data::{
    ColumnStandardizer, FeedError, InstrumentFeed, InstrumentUniverse, RawSeries,
};
use strengthlab_core::domain::{IndustryLevel, InstrumentId, MasterRecord};
use strengthlab_core::industry::IndustryBenchmarkPolicy;
use strengthlab_runner::{
    run_build, BuildConfig, CountingProgress, MemorySink, RunStatus, Stage, SyntheticFeed,
    TracingProgress,
};

/// Synthetic feed whose `broken` instrument reports a zero close.
struct FaultyFeed {
    inner: SyntheticFeed,
    broken: InstrumentId,
}

impl FaultyFeed {
    fn new(count: usize, broken: &str) -> Self {
        Self {
            inner: SyntheticFeed::new(count),
            broken: InstrumentId::new(broken),
        }
    }
}

impl InstrumentFeed for FaultyFeed {
    fn name(&self) -> &str {
        "faulty"
    }

    fn list_instruments(
        &self,
        as_of: Option<NaiveDate>,
        market: Option<&str>,
    ) -> Result<InstrumentUniverse, FeedError> {
        self.inner.list_instruments(as_of, market)
    }

    fn load_taxonomy_master(&self, as_of: Option<NaiveDate>) -> Result<Vec<MasterRecord>, FeedError> {
        self.inner.load_taxonomy_master(as_of)
    }

    fn fetch_daily_series(
        &self,
        id: &InstrumentId,
        start: NaiveDate,
        end: NaiveDate,
        adjusted: bool,
    ) -> Result<RawSeries, FeedError> {
        if id != &self.broken {
            return self.inner.fetch_daily_series(id, start, end, adjusted);
        }
        df!(
            "Date" => ["2023-01-02", "2023-01-03", "2023-01-04"],
            "Open" => [10.0, 10.0, 10.0],
            "High" => [11.0, 11.0, 11.0],
            "Low" => [9.0, 9.0, 9.0],
            "Close" => [10.0, 0.0, 10.5],
            "Volume" => [100.0, 100.0, 100.0]
        )
        .map_err(|e| FeedError::Other(e.to_string()))
    }
}

fn config(workers: usize) -> BuildConfig {
    BuildConfig {
        start_date: NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2023, 12, 29).unwrap(),
        max_workers: workers,
        ..BuildConfig::default()
    }
}

fn short_config(workers: usize) -> BuildConfig {
    BuildConfig {
        start_date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2023, 3, 31).unwrap(),
        max_workers: workers,
        ..BuildConfig::default()
    }
}

// ── Fail-fast ────────────────────────────────────────────────────────

#[test]
fn second_instrument_failing_in_compute_aborts_without_artifacts() {
    for workers in [1, 2] {
        let feed = FaultyFeed::new(2, "000002");
        let sink = MemorySink::new();
        let err = run_build(
            &short_config(workers),
            &feed,
            &ColumnStandardizer::default(),
            &sink,
            &TracingProgress,
        )
        .unwrap_err();

        assert_eq!(err.stage, Stage::Compute, "workers={workers}");
        assert_eq!(err.instrument.as_ref().unwrap().as_str(), "000002");
        assert_eq!(err.kind(), "InputError");
        assert!(err.to_string().contains("000002"));

        let written = sink.snapshot();
        assert!(written.panel.is_none());
        assert!(written.industry.is_none());
        assert!(written.industry_metadata.is_none());

        let meta = sink.last_metadata().unwrap();
        assert_eq!(meta.run_status, RunStatus::Failed);
        let payload = meta.error.unwrap();
        assert_eq!(payload.stage, Stage::Compute);
        assert_eq!(payload.instrument.unwrap().as_str(), "000002");
        assert!(meta.timing_seconds.contains_key("total"));
    }
}

#[test]
fn sequential_run_stops_at_first_failure() {
    let feed = FaultyFeed::new(5, "000001");
    let progress = CountingProgress::default();
    let err = run_build(
        &short_config(1),
        &feed,
        &ColumnStandardizer::default(),
        &MemorySink::new(),
        &progress,
    )
    .unwrap_err();

    assert_eq!(err.instrument.unwrap().as_str(), "000001");
    assert_eq!(progress.started(), 1);
    assert_eq!(progress.batch(), Some((0, 1, 5)));
}

#[test]
fn empty_universe_fails_at_universe_stage() {
    let cfg = BuildConfig {
        market: Some("NASDAQ".into()),
        ..short_config(2)
    };
    let sink = MemorySink::new();
    let err = run_build(
        &cfg,
        &SyntheticFeed::new(4),
        &ColumnStandardizer::default(),
        &sink,
        &TracingProgress,
    )
    .unwrap_err();
    assert_eq!(err.stage, Stage::Universe);
    assert_eq!(sink.last_metadata().unwrap().run_status, RunStatus::Failed);
}

#[test]
fn invalid_config_fails_before_the_feed_is_touched() {
    let cfg = BuildConfig {
        max_workers: 0,
        ..short_config(1)
    };
    let err = run_build(
        &cfg,
        &SyntheticFeed::new(2),
        &ColumnStandardizer::default(),
        &MemorySink::new(),
        &TracingProgress,
    )
    .unwrap_err();
    assert_eq!(err.stage, Stage::Config);
    assert_eq!(err.kind(), "ConfigError");
}

#[test]
fn persist_failure_leaves_only_failure_metadata() {
    let sink = MemorySink::failing_tables();
    let err = run_build(
        &short_config(2),
        &SyntheticFeed::new(3),
        &ColumnStandardizer::default(),
        &sink,
        &TracingProgress,
    )
    .unwrap_err();
    assert_eq!(err.stage, Stage::Persist);
    let written = sink.snapshot();
    assert!(written.panel.is_none());
    assert_eq!(written.metadata.len(), 1);
    assert_eq!(written.metadata[0].run_status, RunStatus::Failed);
}

#[test]
fn industry_failure_after_panel_discards_the_panel() {
    let sink = MemorySink::failing_industry();
    let err = run_build(
        &short_config(2),
        &SyntheticFeed::new(4),
        &ColumnStandardizer::default(),
        &sink,
        &TracingProgress,
    )
    .unwrap_err();
    assert_eq!(err.stage, Stage::Persist);
    assert_eq!(err.kind(), "ArtifactError");

    let written = sink.snapshot();
    assert!(written.panel.is_none());
    assert!(written.industry.is_none());
    assert!(written.industry_metadata.is_none());
    assert_eq!(written.metadata.len(), 1);
    assert_eq!(written.metadata[0].run_status, RunStatus::Failed);
    assert!(sink.staged().panel.is_none());
}

// ── Determinism ──────────────────────────────────────────────────────

#[test]
fn worker_count_does_not_change_content() {
    let feed = SyntheticFeed::new(12);
    let standardizer = ColumnStandardizer::default();

    let serial = run_build(&config(1), &feed, &standardizer, &MemorySink::new(), &TracingProgress)
        .unwrap();
    let parallel = run_build(&config(4), &feed, &standardizer, &MemorySink::new(), &TracingProgress)
        .unwrap();

    assert_eq!(serial.panel.content_hash(), parallel.panel.content_hash());
    assert_eq!(serial.panel.rows(), parallel.panel.rows());
    assert_eq!(serial.industry, parallel.industry);
    assert_eq!(serial.metadata.dataset_hash, parallel.metadata.dataset_hash);
}

// ── Successful builds ────────────────────────────────────────────────

#[test]
fn synthetic_build_produces_ranked_panel_and_industry_table() {
    let feed = SyntheticFeed::new(10);
    let sink = MemorySink::new();
    let progress = CountingProgress::default();
    let outcome = run_build(
        &config(4),
        &feed,
        &ColumnStandardizer::default(),
        &sink,
        &progress,
    )
    .unwrap();

    let panel = &outcome.panel;
    assert_eq!(panel.instruments().len(), 10);
    assert!(panel.columns().contains(&"MRS_120".to_string()));
    assert_eq!(progress.batch(), Some((10, 0, 10)));

    // Later rows have every horizon defined and ranked within 0..=100.
    let last_date = *panel.date_grid().last().unwrap();
    let last_rows: Vec<_> = panel.rows().iter().filter(|r| r.date() == last_date).collect();
    assert_eq!(last_rows.len(), 10);
    for row in &last_rows {
        assert!(row.sma.iter().all(Option::is_some));
        assert!(row.mansfield_rs.is_some());
        for v in &row.mrs {
            let v = v.unwrap();
            assert!((0.0..=100.0).contains(&v));
        }
    }
    assert!(last_rows.iter().any(|r| r.mrs[0] == Some(100.0)));

    // Industry: every level present, wrapper excluded, Unknown kept.
    let levels: std::collections::BTreeSet<IndustryLevel> =
        outcome.industry.iter().map(|r| r.level).collect();
    assert_eq!(levels.len(), 3);
    assert!(outcome.industry.iter().any(|r| r.large == "Unknown"));
    let grid_len = panel.date_grid().len();
    let l_rows = outcome.industry.iter().filter(|r| r.level == IndustryLevel::L).count();
    assert_eq!(l_rows % grid_len, 0);
    let max_count = outcome
        .industry
        .iter()
        .filter(|r| r.level == IndustryLevel::L)
        .map(|r| r.constituent_count)
        .sum::<usize>();
    // Nine equities contribute one return per date after the first.
    assert_eq!(max_count, 9 * (grid_len - 1));

    // Metadata mirrors the build.
    let meta = &outcome.metadata;
    assert!(meta.is_success());
    assert_eq!(meta.instrument_count, 10);
    assert_eq!(meta.rows, panel.len());
    assert_eq!(meta.dataset_hash.as_deref(), Some(panel.content_hash().as_str()));
    assert!(meta.features.contains(&"IsNewHigh1Y".to_string()));
    assert!(!meta.features.contains(&"Close".to_string()));
    for key in ["universe_and_master", "data_fetch_and_features", "mrs_percentile_ranks", "total"] {
        assert!(meta.timing_seconds.contains_key(key), "missing timing {key}");
    }

    let industry_meta = outcome.industry_metadata.as_ref().unwrap();
    assert_eq!(industry_meta.method.mansfield_rs.benchmark.as_deref(), Some("universe"));
    assert!(industry_meta.key_count > 0);

    let written = sink.snapshot();
    assert!(written.panel.is_some());
    assert_eq!(written.metadata.len(), 1);
    assert!(written.industry_metadata.is_some());
}

#[test]
fn test_limit_truncates_universe() {
    let cfg = BuildConfig {
        test_limit: 3,
        ..short_config(2)
    };
    let outcome = run_build(
        &cfg,
        &SyntheticFeed::new(8),
        &ColumnStandardizer::default(),
        &MemorySink::new(),
        &TracingProgress,
    )
    .unwrap();
    let ids: Vec<String> = outcome
        .panel
        .instruments()
        .iter()
        .map(|i| i.to_string())
        .collect();
    assert_eq!(ids, vec!["000001", "000002", "000003"]);
}

#[test]
fn missing_benchmark_leaves_relative_strength_unknown() {
    let cfg = BuildConfig {
        benchmark: None,
        ..config(2)
    };
    let outcome = run_build(
        &cfg,
        &SyntheticFeed::new(4),
        &ColumnStandardizer::default(),
        &MemorySink::new(),
        &TracingProgress,
    )
    .unwrap();

    assert!(outcome
        .panel
        .rows()
        .iter()
        .all(|r| r.mansfield_rs.is_none() && r.mrs.iter().all(Option::is_none)));
    assert!(outcome.panel.rows().iter().any(|r| r.sma[0].is_some()));
    // The universe benchmark still gives industries a reference.
    assert!(outcome.industry.iter().any(|r| r.mansfield_rs.is_some()));
}

#[test]
fn external_industry_benchmark_is_recorded() {
    let mut cfg = short_config(2);
    cfg.industry.benchmark = IndustryBenchmarkPolicy::External;
    cfg.industry.levels = vec![IndustryLevel::L];
    let outcome = run_build(
        &cfg,
        &SyntheticFeed::new(5),
        &ColumnStandardizer::default(),
        &MemorySink::new(),
        &TracingProgress,
    )
    .unwrap();

    let meta = outcome.industry_metadata.unwrap();
    assert_eq!(meta.method.mansfield_rs.benchmark.as_deref(), Some("069500"));
    assert_eq!(meta.levels, vec![IndustryLevel::L]);
    assert!(outcome.industry.iter().all(|r| r.level == IndustryLevel::L));
}

#[test]
fn disabled_industry_skips_master_and_table() {
    let mut cfg = short_config(2);
    cfg.industry.enabled = false;
    let sink = MemorySink::new();
    let outcome = run_build(
        &cfg,
        &SyntheticFeed::new(3),
        &ColumnStandardizer::default(),
        &sink,
        &TracingProgress,
    )
    .unwrap();
    assert!(outcome.industry.is_empty());
    assert!(outcome.industry_metadata.is_none());
    assert!(sink.snapshot().industry.is_none());
    assert!(!outcome.metadata.industry.enabled);
}

#[test]
fn series_are_clipped_to_requested_range() {
    let cfg = short_config(2);
    let outcome = run_build(
        &cfg,
        &SyntheticFeed::new(2),
        &ColumnStandardizer::default(),
        &MemorySink::new(),
        &TracingProgress,
    )
    .unwrap();
    let grid = outcome.panel.date_grid();
    assert!(*grid.first().unwrap() >= cfg.start_date);
    assert!(*grid.last().unwrap() <= cfg.end_date);
}
