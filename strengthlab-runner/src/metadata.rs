//! Run metadata written next to the artifacts.
//!
//! A successful build records what was produced (rows, columns, feature
//! parameters, timings, dataset hash). A failed build records the same run
//! context plus the `error` payload, so every run leaves a trace.

use crate::config::BuildConfig;
use crate::error::{RunError, Stage};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strengthlab_core::domain::{IndustryLevel, InstrumentId, UniversePanel, RECORD_COLUMNS};
use strengthlab_core::indicators::{IndicatorConfig, MrsHorizon};
use strengthlab_core::industry::{IndustryBenchmarkPolicy, IndustryConfig};

/// Current schema version of the metadata documents.
pub const SCHEMA_VERSION: u32 = 1;

/// Decimal places of every percentile column.
pub const PERCENTILE_PRECISION: u32 = 2;

pub const INDUSTRY_INDEX_METHOD: &str = "equal_weighted_daily_return_mean_then_cumprod_base_100";

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
}

/// Location and shape of one written artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFileInfo {
    pub path: Option<String>,
    pub rows: usize,
    pub columns: Vec<String>,
    pub size_mb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MansfieldInfo {
    /// Benchmark instrument id, `"universe"`, or `None` when no benchmark was used.
    pub benchmark: Option<String>,
    pub sma_window: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorInfo {
    pub moving_averages: Vec<usize>,
    pub volume_moving_averages: Vec<usize>,
    pub mansfield_rs: MansfieldInfo,
    pub mrs_horizons: Vec<MrsHorizon>,
    pub percentile_precision: u32,
    pub new_high_window_trading_days: usize,
}

impl IndicatorInfo {
    pub fn new(config: &IndicatorConfig, benchmark: Option<&str>) -> Self {
        Self {
            moving_averages: config.ma_windows.clone(),
            volume_moving_averages: config.vma_windows.clone(),
            mansfield_rs: MansfieldInfo {
                benchmark: benchmark.map(String::from),
                sma_window: config.mansfield_window,
            },
            mrs_horizons: config.mrs_horizons.clone(),
            percentile_precision: PERCENTILE_PRECISION,
            new_high_window_trading_days: config.new_high_window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryInfo {
    pub enabled: bool,
    pub levels: Vec<IndustryLevel>,
    pub benchmark: IndustryBenchmarkPolicy,
    pub excluded_markets: Vec<String>,
    pub output: Option<String>,
    pub metadata_output: Option<String>,
}

impl IndustryInfo {
    fn new(cfg: &BuildConfig) -> Self {
        let IndustryConfig {
            enabled,
            levels,
            benchmark,
            excluded_markets,
        } = cfg.industry.clone();
        let path_if_enabled = |p: std::path::PathBuf| enabled.then(|| p.display().to_string());
        Self {
            enabled,
            levels,
            benchmark,
            excluded_markets,
            output: path_if_enabled(cfg.output.industry_path()),
            metadata_output: path_if_enabled(cfg.output.industry_metadata_path()),
        }
    }
}

/// The knobs a run was invoked with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArgs {
    pub adjusted: bool,
    pub max_workers: usize,
    pub test_limit: usize,
    pub market: Option<String>,
    pub as_of: Option<NaiveDate>,
    pub output_dir: String,
    pub industry_benchmark: IndustryBenchmarkPolicy,
}

impl From<&BuildConfig> for RunArgs {
    fn from(cfg: &BuildConfig) -> Self {
        Self {
            adjusted: cfg.adjusted,
            max_workers: cfg.max_workers,
            test_limit: cfg.test_limit,
            market: cfg.market.clone(),
            as_of: cfg.as_of,
            output_dir: cfg.output.dir.display().to_string(),
            industry_benchmark: cfg.industry.benchmark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvInfo {
    pub crate_version: String,
    pub os: String,
    pub arch: String,
    pub worker_threads: usize,
}

impl EnvInfo {
    pub fn capture(worker_threads: usize) -> Self {
        Self {
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            worker_threads,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub stage: Stage,
    pub instrument: Option<InstrumentId>,
    pub kind: String,
    pub message: String,
}

impl From<&RunError> for ErrorPayload {
    fn from(err: &RunError) -> Self {
        Self {
            stage: err.stage,
            instrument: err.instrument.clone(),
            kind: err.kind().to_string(),
            message: err.source.to_string(),
        }
    }
}

/// Metadata document of the universe panel artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub generated_at_utc: DateTime<Utc>,
    pub run_status: RunStatus,
    pub run_id: String,
    pub provider: ProviderInfo,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub instruments: Vec<InstrumentId>,
    pub instrument_count: usize,
    pub rows: usize,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub indicators: IndicatorInfo,
    pub industry: IndustryInfo,
    pub data_file: Option<DataFileInfo>,
    pub dataset_hash: Option<String>,
    pub args: RunArgs,
    pub timing_seconds: BTreeMap<String, f64>,
    pub env: EnvInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl RunMetadata {
    fn base(cfg: &BuildConfig, provider: &str, run_id: &str, status: RunStatus) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at_utc: Utc::now(),
            run_status: status,
            run_id: run_id.to_string(),
            provider: ProviderInfo {
                name: provider.to_string(),
            },
            start_date: cfg.start_date,
            end_date: cfg.end_date,
            instruments: Vec::new(),
            instrument_count: 0,
            rows: 0,
            columns: Vec::new(),
            features: Vec::new(),
            indicators: IndicatorInfo::new(&cfg.indicators, cfg.benchmark.as_deref()),
            industry: IndustryInfo::new(cfg),
            data_file: None,
            dataset_hash: None,
            args: RunArgs::from(cfg),
            timing_seconds: BTreeMap::new(),
            env: EnvInfo::capture(cfg.max_workers),
            error: None,
        }
    }

    pub fn success(
        cfg: &BuildConfig,
        provider: &str,
        run_id: &str,
        panel: &UniversePanel,
        data_file: Option<DataFileInfo>,
        timing_seconds: BTreeMap<String, f64>,
    ) -> Self {
        let columns = panel.columns();
        let features = columns
            .iter()
            .filter(|c| !RECORD_COLUMNS.contains(&c.as_str()))
            .cloned()
            .collect();
        let instruments = panel.instruments();
        Self {
            instrument_count: instruments.len(),
            instruments,
            rows: panel.len(),
            columns,
            features,
            data_file,
            dataset_hash: Some(panel.content_hash()),
            timing_seconds,
            ..Self::base(cfg, provider, run_id, RunStatus::Success)
        }
    }

    pub fn failure(
        cfg: &BuildConfig,
        provider: &str,
        run_id: &str,
        error: &RunError,
        timing_seconds: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            timing_seconds,
            error: Some(ErrorPayload::from(error)),
            ..Self::base(cfg, provider, run_id, RunStatus::Failed)
        }
    }

    pub fn is_success(&self) -> bool {
        self.run_status == RunStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryMethod {
    pub industry_index: String,
    pub mansfield_rs: MansfieldInfo,
    pub mrs_horizons: Vec<MrsHorizon>,
    pub percentile_scope: String,
    pub excluded_markets: Vec<String>,
}

/// Metadata document of the industry artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryMetadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub generated_at_utc: DateTime<Utc>,
    pub run_status: RunStatus,
    pub run_id: String,
    pub provider: ProviderInfo,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub source_panel: Option<String>,
    pub levels: Vec<IndustryLevel>,
    pub key_count: usize,
    pub method: IndustryMethod,
    pub data_file: DataFileInfo,
    pub env: EnvInfo,
}

impl IndustryMetadata {
    /// `benchmark` is the label of the series the indices were measured
    /// against: an instrument id or `"universe"`.
    pub fn new(
        cfg: &BuildConfig,
        provider: &str,
        run_id: &str,
        benchmark: Option<&str>,
        key_count: usize,
        source_panel: Option<String>,
        data_file: DataFileInfo,
    ) -> Self {
        let mut levels = cfg.industry.levels.clone();
        levels.sort();
        levels.dedup();
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at_utc: Utc::now(),
            run_status: RunStatus::Success,
            run_id: run_id.to_string(),
            provider: ProviderInfo {
                name: provider.to_string(),
            },
            start_date: cfg.start_date,
            end_date: cfg.end_date,
            source_panel,
            levels,
            key_count,
            method: IndustryMethod {
                industry_index: INDUSTRY_INDEX_METHOD.to_string(),
                mansfield_rs: MansfieldInfo {
                    benchmark: benchmark.map(String::from),
                    sma_window: cfg.indicators.mansfield_window,
                },
                mrs_horizons: cfg.indicators.mrs_horizons.clone(),
                percentile_scope: "per_date_within_level".to_string(),
                excluded_markets: cfg.industry.excluded_markets.clone(),
            },
            data_file,
            env: EnvInfo::capture(cfg.max_workers),
        }
    }
}
