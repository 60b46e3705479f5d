//! Serializable build configuration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strengthlab_core::indicators::IndicatorConfig;
use strengthlab_core::industry::{IndustryBenchmarkPolicy, IndustryConfig};
use thiserror::Error;

/// Unique identifier for a build run (content-addressable hash).
pub type RunId = String;

/// Benchmark instrument of the original KRX universe (KODEX 200).
pub const DEFAULT_BENCHMARK_INSTRUMENT: &str = "069500";
pub const DEFAULT_MAX_WORKERS: usize = 8;
pub const DEFAULT_CODE_WIDTH: usize = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where the artifacts of one build land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub panel_file: String,
    pub panel_metadata_file: String,
    pub industry_file: String,
    pub industry_metadata_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            panel_file: "features.parquet".into(),
            panel_metadata_file: "features.meta.json".into(),
            industry_file: "industry.parquet".into(),
            industry_metadata_file: "industry.meta.json".into(),
        }
    }
}

impl OutputConfig {
    pub fn panel_path(&self) -> PathBuf {
        self.dir.join(&self.panel_file)
    }

    pub fn panel_metadata_path(&self) -> PathBuf {
        self.dir.join(&self.panel_metadata_file)
    }

    pub fn industry_path(&self) -> PathBuf {
        self.dir.join(&self.industry_file)
    }

    pub fn industry_metadata_path(&self) -> PathBuf {
        self.dir.join(&self.industry_metadata_file)
    }
}

/// Everything needed to reproduce one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// First requested date (inclusive).
    pub start_date: NaiveDate,
    /// Last requested date (inclusive).
    pub end_date: NaiveDate,
    /// Universe/master snapshot date; `None` lets the feed pick.
    pub as_of: Option<NaiveDate>,
    /// Market filter passed to the feed.
    pub market: Option<String>,
    /// Request adjusted prices from the feed.
    pub adjusted: bool,
    /// External benchmark instrument; `None` leaves relative strength unknown.
    pub benchmark: Option<String>,
    /// Worker pool size; 1 runs sequentially.
    pub max_workers: usize,
    /// Keep only the first N instruments; 0 keeps all.
    pub test_limit: usize,
    /// Left-pad master codes to this width when joining.
    pub code_width: Option<usize>,
    pub indicators: IndicatorConfig,
    pub industry: IndustryConfig,
    pub output: OutputConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap_or(NaiveDate::MIN),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or(NaiveDate::MAX),
            as_of: None,
            market: None,
            adjusted: true,
            benchmark: Some(DEFAULT_BENCHMARK_INSTRUMENT.to_string()),
            max_workers: DEFAULT_MAX_WORKERS,
            test_limit: 0,
            code_width: Some(DEFAULT_CODE_WIDTH),
            indicators: IndicatorConfig::default(),
            industry: IndustryConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl BuildConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_date > self.end_date {
            return Err(ConfigError::Invalid(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be >= 1".into()));
        }
        if self.code_width == Some(0) {
            return Err(ConfigError::Invalid("code_width must be >= 1".into()));
        }
        if self
            .benchmark
            .as_deref()
            .is_some_and(|b| b.trim().is_empty())
        {
            return Err(ConfigError::Invalid("benchmark instrument is blank".into()));
        }
        self.indicators
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.industry.enabled {
            if self.industry.levels.is_empty() {
                return Err(ConfigError::Invalid(
                    "industry is enabled but no levels are requested".into(),
                ));
            }
            if self.industry.benchmark == IndustryBenchmarkPolicy::External
                && self.benchmark.is_none()
            {
                return Err(ConfigError::Invalid(
                    "industry benchmark 'external' needs a benchmark instrument".into(),
                ));
            }
        }
        Ok(())
    }

    /// Deterministic hash of the full configuration.
    ///
    /// Two builds with identical configs share a run id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json =
            serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
