//! Build orchestrator.
//!
//! One build runs these stages in order:
//! 1. Universe and taxonomy master from the feed (`test_limit` applied)
//! 2. Benchmark series, fetched and standardized once, then shared read-only
//! 3. Per-instrument fetch → standardize → features on a bounded worker pool
//! 4. Assembly sorted by (date, instrument)
//! 5. Cross-sectional percentile ranks
//! 6. Industry indices per requested level
//! 7. Artifacts, staged and then committed together
//!
//! The first per-instrument failure aborts the build. Workers that have not
//! started yet see the cancel flag and skip their work; running workers are
//! never interrupted. On any failure the sink discards whatever was staged,
//! a failure-status metadata document is written on a best-effort basis and
//! the error is returned.

use crate::artifacts::{ArtifactError, ArtifactSink};
use crate::config::BuildConfig;
use crate::error::{RunError, Stage, StageError};
use crate::metadata::{IndustryMetadata, RunMetadata};
use crate::progress::BuildProgress;
use crate::timing::{profile, StageTimings};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;
use strengthlab_core::cross_section::normalize;
use strengthlab_core::data::{InstrumentFeed, InstrumentUniverse, Standardizer};
use strengthlab_core::domain::{
    BenchmarkSeries, IndicatorPanelRow, InstrumentDailyRecord, InstrumentId, MasterRecord,
    RawPanel, UniversePanel,
};
use strengthlab_core::indicators::compute_features;
use strengthlab_core::industry::{
    compute_industry_levels, equal_weight_universe_benchmark, IndustryBenchmarkPolicy,
    IndustryDailyRow, IndustryMembership,
};
use strengthlab_core::CoreError;
use tracing::{error, info, warn};

pub const TIMING_UNIVERSE: &str = "universe_and_master";
pub const TIMING_BENCHMARK: &str = "benchmark_fetch";
pub const TIMING_FEATURES: &str = "data_fetch_and_features";
pub const TIMING_ASSEMBLE: &str = "concat_and_sort";
pub const TIMING_RANKS: &str = "mrs_percentile_ranks";
pub const TIMING_INDUSTRY: &str = "industry";
pub const TIMING_PERSIST: &str = "save_artifacts";

/// Everything a successful build produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub panel: UniversePanel,
    /// Empty when industry aggregation is disabled.
    pub industry: Vec<IndustryDailyRow>,
    pub metadata: RunMetadata,
    pub industry_metadata: Option<IndustryMetadata>,
}

/// Read-only state shared by every worker.
struct WorkerContext<'a> {
    cfg: &'a BuildConfig,
    feed: &'a dyn InstrumentFeed,
    standardizer: &'a dyn Standardizer,
    benchmark: Option<&'a BenchmarkSeries>,
}

struct IndustryOutput {
    rows: Vec<IndustryDailyRow>,
    benchmark_label: Option<String>,
    key_count: usize,
}

/// Run one full build.
pub fn run_build(
    cfg: &BuildConfig,
    feed: &dyn InstrumentFeed,
    standardizer: &dyn Standardizer,
    sink: &dyn ArtifactSink,
    progress: &dyn BuildProgress,
) -> Result<BuildOutcome, RunError> {
    let mut timings = StageTimings::new();
    let result = build(cfg, feed, standardizer, sink, progress, &mut timings);

    if let Err(err) = &result {
        error!(
            stage = %err.stage,
            instrument = err.instrument.as_ref().map_or("-", |i| i.as_str()),
            kind = err.kind(),
            error = %err.source,
            "build failed"
        );
        sink.abort();
        let run_id = cfg.run_id().unwrap_or_default();
        let meta = RunMetadata::failure(cfg, feed.name(), &run_id, err, timings.snapshot());
        if let Err(write_err) = sink.write_metadata(&meta) {
            warn!(error = %write_err, "could not write failure metadata");
        }
    }
    result
}

fn build(
    cfg: &BuildConfig,
    feed: &dyn InstrumentFeed,
    standardizer: &dyn Standardizer,
    sink: &dyn ArtifactSink,
    progress: &dyn BuildProgress,
    timings: &mut StageTimings,
) -> Result<BuildOutcome, RunError> {
    cfg.validate().map_err(|e| RunError::at(Stage::Config, e))?;
    let run_id = cfg.run_id().map_err(|e| RunError::at(Stage::Config, e))?;
    info!(
        run_id = %run_id,
        provider = feed.name(),
        start = %cfg.start_date,
        end = %cfg.end_date,
        workers = cfg.max_workers,
        "starting build"
    );

    let (universe, master) = timings.measure(TIMING_UNIVERSE, || load_universe(cfg, feed))?;
    info!(instruments = universe.len(), master_rows = master.len(), "universe resolved");

    let benchmark =
        timings.measure(TIMING_BENCHMARK, || load_benchmark(cfg, feed, standardizer))?;

    let ctx = WorkerContext {
        cfg,
        feed,
        standardizer,
        benchmark: benchmark.as_ref(),
    };
    let frames = timings.measure(TIMING_FEATURES, || {
        compute_universe(&ctx, &universe.instruments, progress)
    })?;

    let raw = timings
        .measure(TIMING_ASSEMBLE, || RawPanel::assemble(cfg.indicators.clone(), frames))
        .map_err(|e| RunError::at(Stage::Assemble, e))?;
    let panel = timings.measure(TIMING_RANKS, || normalize(raw));
    info!(rows = panel.len(), dates = panel.date_grid().len(), "universe panel ready");

    let industry = if cfg.industry.enabled {
        Some(timings.measure(TIMING_INDUSTRY, || {
            build_industry(cfg, &panel, &master, benchmark.as_ref())
        })?)
    } else {
        None
    };

    // Nothing becomes visible until every output is staged.
    let persist = |e: ArtifactError| RunError::at(Stage::Persist, e);
    let (staged, elapsed) = profile(|| -> Result<_, RunError> {
        let data_file = sink.stage_panel(&panel).map_err(persist)?;
        let industry_metadata = match &industry {
            Some(out) => {
                let info = sink
                    .stage_industry(&out.rows, &cfg.indicators)
                    .map_err(persist)?;
                let meta = IndustryMetadata::new(
                    cfg,
                    feed.name(),
                    &run_id,
                    out.benchmark_label.as_deref(),
                    out.key_count,
                    data_file.path.clone(),
                    info,
                );
                sink.stage_industry_metadata(&meta).map_err(persist)?;
                Some(meta)
            }
            None => None,
        };
        Ok((data_file, industry_metadata))
    });
    timings.record(TIMING_PERSIST, elapsed);
    let (data_file, industry_metadata) = staged?;

    let metadata = RunMetadata::success(
        cfg,
        feed.name(),
        &run_id,
        &panel,
        Some(data_file),
        timings.snapshot(),
    );
    sink.stage_metadata(&metadata).map_err(persist)?;
    sink.commit().map_err(persist)?;
    info!(run_id = %run_id, rows = metadata.rows, "build complete");

    Ok(BuildOutcome {
        panel,
        industry: industry.map(|out| out.rows).unwrap_or_default(),
        metadata,
        industry_metadata,
    })
}

fn load_universe(
    cfg: &BuildConfig,
    feed: &dyn InstrumentFeed,
) -> Result<(InstrumentUniverse, Vec<MasterRecord>), RunError> {
    let mut universe = feed
        .list_instruments(cfg.as_of, cfg.market.as_deref())
        .map_err(|e| RunError::at(Stage::Universe, e))?;
    universe.truncate(cfg.test_limit);
    if universe.is_empty() {
        return Err(RunError::at(
            Stage::Universe,
            CoreError::Input("feed returned no instruments".into()),
        ));
    }
    let mut per_market: BTreeMap<&str, usize> = BTreeMap::new();
    for id in &universe.instruments {
        *per_market.entry(universe.market_of(id).unwrap_or("unknown")).or_default() += 1;
    }
    info!(markets = ?per_market, "universe markets");

    let master = if cfg.industry.enabled {
        feed.load_taxonomy_master(cfg.as_of)
            .map_err(|e| RunError::at(Stage::Universe, e))?
    } else {
        Vec::new()
    };
    Ok((universe, master))
}

fn load_benchmark(
    cfg: &BuildConfig,
    feed: &dyn InstrumentFeed,
    standardizer: &dyn Standardizer,
) -> Result<Option<BenchmarkSeries>, RunError> {
    let Some(code) = cfg.benchmark.as_deref() else {
        warn!("no benchmark instrument configured; relative strength stays unknown");
        return Ok(None);
    };
    let id = InstrumentId::new(code);
    let fail = |e: StageError| RunError::for_instrument(Stage::Benchmark, &id, e);

    let raw = feed
        .fetch_daily_series(&id, cfg.start_date, cfg.end_date, cfg.adjusted)
        .map_err(|e| fail(e.into()))?;
    let mut records = standardizer
        .standardize(&raw, &id)
        .map_err(|e| fail(e.into()))?;
    clip_to_range(&mut records, cfg.start_date, cfg.end_date);
    let series = BenchmarkSeries::from_records(&records).map_err(|e| fail(e.into()))?;
    info!(benchmark = %id, points = series.len(), "benchmark loaded");
    Ok(Some(series))
}

fn clip_to_range(records: &mut Vec<InstrumentDailyRecord>, start: NaiveDate, end: NaiveDate) {
    records.retain(|r| r.date >= start && r.date <= end);
}

/// Fetch, standardize and compute one instrument, checking the cancel flag
/// before every step.
fn process_instrument(
    ctx: &WorkerContext<'_>,
    id: &InstrumentId,
    cancel: &AtomicBool,
) -> Result<Vec<IndicatorPanelRow>, RunError> {
    let proceed = |stage: Stage| {
        if cancel.load(Ordering::Relaxed) {
            Err(RunError::cancelled(stage, id))
        } else {
            Ok(())
        }
    };
    let cfg = ctx.cfg;

    proceed(Stage::Fetch)?;
    let raw = ctx
        .feed
        .fetch_daily_series(id, cfg.start_date, cfg.end_date, cfg.adjusted)
        .map_err(|e| RunError::for_instrument(Stage::Fetch, id, e))?;

    proceed(Stage::Standardize)?;
    let mut records = ctx
        .standardizer
        .standardize(&raw, id)
        .map_err(|e| RunError::for_instrument(Stage::Standardize, id, e))?;
    clip_to_range(&mut records, cfg.start_date, cfg.end_date);
    if records.is_empty() {
        return Err(RunError::for_instrument(
            Stage::Standardize,
            id,
            CoreError::Input(format!(
                "no rows between {} and {}",
                cfg.start_date, cfg.end_date
            )),
        ));
    }

    proceed(Stage::Compute)?;
    compute_features(&records, ctx.benchmark, &cfg.indicators)
        .map_err(|e| RunError::for_instrument(Stage::Compute, id, e))
}

/// Run every instrument on a private pool of `max_workers` threads, or
/// sequentially when `max_workers == 1`. Returns the first failure once all
/// dispatched work has settled.
fn compute_universe(
    ctx: &WorkerContext<'_>,
    instruments: &[InstrumentId],
    progress: &dyn BuildProgress,
) -> Result<Vec<Vec<IndicatorPanelRow>>, RunError> {
    let total = instruments.len();
    let cancel = AtomicBool::new(false);
    let first_failure: OnceLock<RunError> = OnceLock::new();
    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let task = |(index, id): (usize, &InstrumentId)| -> Option<Vec<IndicatorPanelRow>> {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        progress.on_start(id, index, total);
        match process_instrument(ctx, id, &cancel) {
            Ok(rows) => {
                succeeded.fetch_add(1, Ordering::Relaxed);
                progress.on_complete(id, index, total, Ok(rows.len()));
                Some(rows)
            }
            Err(err) => {
                progress.on_complete(id, index, total, Err(&err.source));
                if !err.source.is_cancelled() {
                    failed.fetch_add(1, Ordering::Relaxed);
                    cancel.store(true, Ordering::Relaxed);
                    let _ = first_failure.set(err);
                }
                None
            }
        }
    };

    let frames: Vec<Option<Vec<IndicatorPanelRow>>> = if ctx.cfg.max_workers <= 1 {
        let mut out = Vec::with_capacity(total);
        for item in instruments.iter().enumerate() {
            let frame = task(item);
            let stop = frame.is_none();
            out.push(frame);
            if stop {
                break;
            }
        }
        out
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(ctx.cfg.max_workers)
            .build()
            .map_err(|e| RunError::at(Stage::Fetch, StageError::Pool(e.to_string())))?;
        pool.install(|| instruments.par_iter().enumerate().map(task).collect())
    };

    progress.on_batch_complete(
        succeeded.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        total,
    );
    if let Some(err) = first_failure.into_inner() {
        return Err(err);
    }
    Ok(frames.into_iter().flatten().collect())
}

fn build_industry(
    cfg: &BuildConfig,
    panel: &UniversePanel,
    master: &[MasterRecord],
    external: Option<&BenchmarkSeries>,
) -> Result<IndustryOutput, RunError> {
    let fail = |e: CoreError| RunError::at(Stage::Industry, e);
    let membership =
        IndustryMembership::from_master(master, &cfg.industry.excluded_markets, cfg.code_width)
            .map_err(fail)?;
    let grid = panel.date_grid();

    let universe_benchmark = match cfg.industry.benchmark {
        IndustryBenchmarkPolicy::Universe => {
            Some(equal_weight_universe_benchmark(panel, &grid).map_err(fail)?)
        }
        IndustryBenchmarkPolicy::External => None,
    };
    let benchmark = universe_benchmark.as_ref().or(external);
    let benchmark_label = match cfg.industry.benchmark {
        IndustryBenchmarkPolicy::Universe => {
            Some(IndustryBenchmarkPolicy::Universe.as_str().to_string())
        }
        IndustryBenchmarkPolicy::External => external.map(|b| b.name().to_string()),
    };

    let rows = compute_industry_levels(
        panel,
        &membership,
        benchmark,
        &cfg.industry.levels,
        &grid,
        &cfg.indicators,
    )
    .map_err(fail)?;
    let key_count = rows
        .iter()
        .map(|r| (r.level, &r.key))
        .collect::<HashSet<_>>()
        .len();
    info!(
        rows = rows.len(),
        keys = key_count,
        classified = membership.entry_count(),
        excluded = membership.excluded_count(),
        benchmark = benchmark_label.as_deref().unwrap_or("-"),
        "industry indices ready"
    );

    Ok(IndustryOutput {
        rows,
        benchmark_label,
        key_count,
    })
}
