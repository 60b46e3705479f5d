//! Artifact persistence: the universe panel, the industry table, and their
//! metadata documents.
//!
//! Tables are written as Parquet (indicator columns narrowed to `f32`),
//! metadata as pretty JSON. A successful build stages every output first and
//! publishes them together with [`ArtifactSink::commit`]; a failed build
//! calls [`ArtifactSink::abort`] so no table from that run stays in place.
//! Failure metadata bypasses staging.

use crate::config::OutputConfig;
use crate::metadata::{DataFileInfo, IndustryMetadata, RunMetadata};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use strengthlab_core::domain::UniversePanel;
use strengthlab_core::indicators::IndicatorConfig;
use strengthlab_core::industry::{industry_columns, IndustryDailyRow};
use thiserror::Error;

/// Days from 0001-01-01 (CE) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Polars `Date` physical value: days since 1970-01-01.
fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to encode artifact: {0}")]
    Encode(String),

    #[error("failed to write artifact: {0}")]
    Write(String),
}

impl From<anyhow::Error> for ArtifactError {
    fn from(e: anyhow::Error) -> Self {
        ArtifactError::Write(format!("{e:#}"))
    }
}

impl From<PolarsError> for ArtifactError {
    fn from(e: PolarsError) -> Self {
        ArtifactError::Encode(e.to_string())
    }
}

/// Destination of the build outputs.
///
/// `stage_*` calls are invisible to readers until [`commit`](Self::commit)
/// succeeds. `commit` publishes in staging order and, if any publish fails,
/// removes whatever it already published before returning the error.
pub trait ArtifactSink: Send + Sync {
    fn stage_panel(&self, panel: &UniversePanel) -> Result<DataFileInfo, ArtifactError>;

    fn stage_industry(
        &self,
        rows: &[IndustryDailyRow],
        config: &IndicatorConfig,
    ) -> Result<DataFileInfo, ArtifactError>;

    fn stage_industry_metadata(&self, metadata: &IndustryMetadata) -> Result<(), ArtifactError>;

    fn stage_metadata(&self, metadata: &RunMetadata) -> Result<(), ArtifactError>;

    fn commit(&self) -> Result<(), ArtifactError>;

    /// Discard everything staged since the last commit.
    fn abort(&self);

    /// Write a metadata document immediately, outside staging.
    fn write_metadata(&self, metadata: &RunMetadata) -> Result<(), ArtifactError>;
}

// ── Parquet sink ─────────────────────────────────────────────────────

/// A file written to its `.tmp` sibling, waiting to be renamed into place.
#[derive(Debug)]
struct StagedFile {
    tmp: PathBuf,
    path: PathBuf,
}

/// Writes Parquet tables and JSON metadata under an [`OutputConfig`].
#[derive(Debug)]
pub struct ParquetArtifactSink {
    output: OutputConfig,
    staged: Mutex<Vec<StagedFile>>,
}

impl ParquetArtifactSink {
    pub fn new(output: OutputConfig) -> Self {
        Self {
            output,
            staged: Mutex::default(),
        }
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    fn push_staged(&self, tmp: PathBuf, path: PathBuf) -> Result<(), ArtifactError> {
        let mut staged = self.staged.lock().map_err(|_| {
            let _ = fs::remove_file(&tmp);
            ArtifactError::Write("staging list lock poisoned".into())
        })?;
        staged.push(StagedFile { tmp, path });
        Ok(())
    }

    fn take_staged(&self) -> Vec<StagedFile> {
        match self.staged.lock() {
            Ok(mut staged) => std::mem::take(&mut *staged),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn stage_table(&self, df: &mut DataFrame, path: PathBuf) -> Result<DataFileInfo, ArtifactError> {
        let tmp = stage_parquet(df, &path)?;
        let info = match file_info(&tmp, &path, df) {
            Ok(info) => info,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e.into());
            }
        };
        self.push_staged(tmp, path)?;
        Ok(info)
    }
}

impl ArtifactSink for ParquetArtifactSink {
    fn stage_panel(&self, panel: &UniversePanel) -> Result<DataFileInfo, ArtifactError> {
        let mut df = panel_frame(panel)?;
        let info = self.stage_table(&mut df, self.output.panel_path())?;
        tracing::debug!(rows = info.rows, "staged universe panel");
        Ok(info)
    }

    fn stage_industry(
        &self,
        rows: &[IndustryDailyRow],
        config: &IndicatorConfig,
    ) -> Result<DataFileInfo, ArtifactError> {
        let mut df = industry_frame(rows, config)?;
        let info = self.stage_table(&mut df, self.output.industry_path())?;
        tracing::debug!(rows = info.rows, "staged industry table");
        Ok(info)
    }

    fn stage_industry_metadata(&self, metadata: &IndustryMetadata) -> Result<(), ArtifactError> {
        let path = self.output.industry_metadata_path();
        let tmp = stage_json(metadata, &path)?;
        self.push_staged(tmp, path)
    }

    fn stage_metadata(&self, metadata: &RunMetadata) -> Result<(), ArtifactError> {
        let path = self.output.panel_metadata_path();
        let tmp = stage_json(metadata, &path)?;
        self.push_staged(tmp, path)
    }

    fn commit(&self) -> Result<(), ArtifactError> {
        let staged = self.take_staged();
        let mut published: Vec<&Path> = Vec::with_capacity(staged.len());
        for (i, file) in staged.iter().enumerate() {
            if let Err(e) = publish(&file.tmp, &file.path) {
                for path in published {
                    if let Err(rm) = fs::remove_file(path) {
                        tracing::warn!(path = %path.display(), error = %rm, "could not roll back artifact");
                    }
                }
                for rest in &staged[i..] {
                    let _ = fs::remove_file(&rest.tmp);
                }
                return Err(e.into());
            }
            tracing::info!(path = %file.path.display(), "wrote artifact");
            published.push(&file.path);
        }
        Ok(())
    }

    fn abort(&self) {
        for file in self.take_staged() {
            if let Err(e) = fs::remove_file(&file.tmp) {
                tracing::warn!(path = %file.tmp.display(), error = %e, "could not discard staged artifact");
            }
        }
    }

    fn write_metadata(&self, metadata: &RunMetadata) -> Result<(), ArtifactError> {
        let path = self.output.panel_metadata_path();
        write_json(metadata, &path)?;
        tracing::info!(path = %path.display(), status = ?metadata.run_status, "wrote run metadata");
        Ok(())
    }
}

// ── Frames ───────────────────────────────────────────────────────────

/// `Date` column from calendar dates.
pub(crate) fn date_column(name: &str, dates: impl Iterator<Item = NaiveDate>) -> PolarsResult<Column> {
    let days: Vec<i32> = dates.map(epoch_days).collect();
    Column::new(name.into(), days).cast(&DataType::Date)
}

fn f32_column(name: &str, values: impl Iterator<Item = Option<f64>>) -> Column {
    let narrowed: Vec<Option<f32>> = values.map(|v| v.map(|x| x as f32)).collect();
    Column::new(name.into(), narrowed)
}

/// Universe panel as a DataFrame, columns in [`UniversePanel::columns`] order.
pub fn panel_frame(panel: &UniversePanel) -> PolarsResult<DataFrame> {
    let rows = panel.rows();
    let config = panel.config();
    let float = |name: &str, f: fn(&strengthlab_core::domain::InstrumentDailyRecord) -> f64| {
        Column::new(name.into(), rows.iter().map(|r| f(&r.record)).collect::<Vec<f64>>())
    };

    let mut columns = vec![
        date_column("Date", rows.iter().map(|r| r.date()))?,
        float("Open", |r| r.open),
        float("High", |r| r.high),
        float("Low", |r| r.low),
        float("Close", |r| r.close),
        float("Volume", |r| r.volume),
        Column::new(
            "TradingValue".into(),
            rows.iter().map(|r| r.record.trading_value).collect::<Vec<_>>(),
        ),
        Column::new(
            "ChangePct".into(),
            rows.iter().map(|r| r.record.change_pct).collect::<Vec<_>>(),
        ),
        Column::new(
            "InstrumentId".into(),
            rows.iter().map(|r| r.instrument().as_str()).collect::<Vec<&str>>(),
        ),
    ];

    for (k, name) in config.sma_columns().iter().enumerate() {
        columns.push(f32_column(name, rows.iter().map(|r| r.sma.get(k).copied().flatten())));
    }
    for (k, name) in config.vma_columns().iter().enumerate() {
        columns.push(f32_column(name, rows.iter().map(|r| r.vma.get(k).copied().flatten())));
    }
    columns.push(f32_column(
        strengthlab_core::indicators::MANSFIELD_RS_COLUMN,
        rows.iter().map(|r| r.mansfield_rs),
    ));
    columns.push(Column::new(
        strengthlab_core::indicators::NEW_HIGH_COLUMN.into(),
        rows.iter().map(|r| r.is_new_high_1y).collect::<Vec<Option<bool>>>(),
    ));
    for (k, name) in config.mrs_columns().iter().enumerate() {
        columns.push(f32_column(name, rows.iter().map(|r| r.mrs.get(k).copied().flatten())));
    }

    DataFrame::new(columns)
}

/// Industry rows as a DataFrame, columns in [`industry_columns`] order.
pub fn industry_frame(
    rows: &[IndustryDailyRow],
    config: &IndicatorConfig,
) -> PolarsResult<DataFrame> {
    let names = industry_columns(config);
    let label = |s: &String| (!s.is_empty()).then(|| s.clone());

    let mut columns = vec![
        date_column(&names[0], rows.iter().map(|r| r.date))?,
        Column::new(
            names[1].as_str().into(),
            rows.iter().map(|r| r.level.as_str()).collect::<Vec<&str>>(),
        ),
        Column::new(
            names[2].as_str().into(),
            rows.iter().map(|r| r.large.clone()).collect::<Vec<String>>(),
        ),
        Column::new(
            names[3].as_str().into(),
            rows.iter().map(|r| label(&r.mid)).collect::<Vec<Option<String>>>(),
        ),
        Column::new(
            names[4].as_str().into(),
            rows.iter().map(|r| label(&r.small)).collect::<Vec<Option<String>>>(),
        ),
        Column::new(
            names[5].as_str().into(),
            rows.iter().map(|r| r.key.to_string()).collect::<Vec<String>>(),
        ),
        Column::new(
            names[6].as_str().into(),
            rows.iter().map(|r| r.industry_close).collect::<Vec<f64>>(),
        ),
        Column::new(
            names[7].as_str().into(),
            rows.iter().map(|r| r.industry_return).collect::<Vec<f64>>(),
        ),
        Column::new(
            names[8].as_str().into(),
            rows.iter()
                .map(|r| r.constituent_count as u32)
                .collect::<Vec<u32>>(),
        ),
        f32_column(&names[9], rows.iter().map(|r| r.mansfield_rs)),
    ];
    for (k, name) in names[10..].iter().enumerate() {
        columns.push(f32_column(name, rows.iter().map(|r| r.mrs.get(k).copied().flatten())));
    }

    DataFrame::new(columns)
}

// ── File helpers ─────────────────────────────────────────────────────

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Rename `tmp` onto `path`; `tmp` is removed if the rename fails.
fn publish(tmp: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp, path)
        .map_err(|e| {
            let _ = fs::remove_file(tmp);
            e
        })
        .with_context(|| format!("failed to move {} into place", path.display()))
}

/// Write a DataFrame to the `.tmp` sibling of `path` and return that sibling.
fn stage_parquet(df: &mut DataFrame, path: &Path) -> Result<PathBuf> {
    ensure_parent(path)?;
    let tmp = tmp_path(path);
    let written = fs::File::create(&tmp)
        .with_context(|| format!("failed to create {}", tmp.display()))
        .and_then(|file| {
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("failed to write parquet {}", tmp.display()))
        });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(tmp)
}

/// Write a DataFrame to `path` via a temporary sibling.
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    let tmp = stage_parquet(df, path)?;
    publish(&tmp, path)
}

pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    ParquetReader::new(file)
        .finish()
        .with_context(|| format!("failed to read parquet {}", path.display()))
}

fn stage_json<T: Serialize>(value: &T, path: &Path) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize metadata")?;
    ensure_parent(path)?;
    let tmp = tmp_path(path);
    if let Err(e) = fs::write(&tmp, json) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("failed to write {}", tmp.display()));
    }
    Ok(tmp)
}

/// Serialize `value` as pretty JSON to `path` via a temporary sibling.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let tmp = stage_json(value, path)?;
    publish(&tmp, path)
}

/// Describe the file at `written`, reporting it under its final `path`.
fn file_info(written: &Path, path: &Path, df: &DataFrame) -> Result<DataFileInfo> {
    let bytes = fs::metadata(written)
        .with_context(|| format!("failed to stat {}", written.display()))?
        .len();
    let size_mb = (bytes as f64 / (1024.0 * 1024.0) * 1000.0).round() / 1000.0;
    Ok(DataFileInfo {
        path: Some(path.display().to_string()),
        rows: df.height(),
        columns: df
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect(),
        size_mb: Some(size_mb),
    })
}

// ── In-memory sink ───────────────────────────────────────────────────

/// Everything a [`MemorySink`] received.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifacts {
    pub panel: Option<UniversePanel>,
    pub industry: Option<Vec<IndustryDailyRow>>,
    /// Every metadata document, in write order.
    pub metadata: Vec<RunMetadata>,
    pub industry_metadata: Option<IndustryMetadata>,
}

/// Keeps artifacts in memory. Optionally refuses table writes.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<MemoryArtifacts>,
    staged: Mutex<MemoryArtifacts>,
    fail_panel: bool,
    fail_industry: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose panel and industry writes fail; metadata still lands.
    pub fn failing_tables() -> Self {
        Self {
            fail_panel: true,
            fail_industry: true,
            ..Self::default()
        }
    }

    /// A sink that accepts the panel but refuses the industry table.
    pub fn failing_industry() -> Self {
        Self {
            fail_industry: true,
            ..Self::default()
        }
    }

    /// Committed artifacts plus immediate metadata writes.
    pub fn snapshot(&self) -> MemoryArtifacts {
        self.inner
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Artifacts staged but not yet committed.
    pub fn staged(&self) -> MemoryArtifacts {
        self.staged
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    pub fn last_metadata(&self) -> Option<RunMetadata> {
        self.snapshot().metadata.pop()
    }

    fn with_staged<R>(&self, f: impl FnOnce(&mut MemoryArtifacts) -> R) -> Result<R, ArtifactError> {
        let mut guard = self
            .staged
            .lock()
            .map_err(|_| ArtifactError::Write("memory sink lock poisoned".into()))?;
        Ok(f(&mut guard))
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut MemoryArtifacts) -> R) -> Result<R, ArtifactError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ArtifactError::Write("memory sink lock poisoned".into()))?;
        Ok(f(&mut guard))
    }

    fn refuse(table: &str) -> ArtifactError {
        ArtifactError::Write(format!("memory sink refuses the {table} table"))
    }
}

impl ArtifactSink for MemorySink {
    fn stage_panel(&self, panel: &UniversePanel) -> Result<DataFileInfo, ArtifactError> {
        if self.fail_panel {
            return Err(Self::refuse("panel"));
        }
        let info = DataFileInfo {
            path: None,
            rows: panel.len(),
            columns: panel.columns(),
            size_mb: None,
        };
        self.with_staged(|a| a.panel = Some(panel.clone()))?;
        Ok(info)
    }

    fn stage_industry(
        &self,
        rows: &[IndustryDailyRow],
        config: &IndicatorConfig,
    ) -> Result<DataFileInfo, ArtifactError> {
        if self.fail_industry {
            return Err(Self::refuse("industry"));
        }
        let info = DataFileInfo {
            path: None,
            rows: rows.len(),
            columns: industry_columns(config),
            size_mb: None,
        };
        self.with_staged(|a| a.industry = Some(rows.to_vec()))?;
        Ok(info)
    }

    fn stage_industry_metadata(&self, metadata: &IndustryMetadata) -> Result<(), ArtifactError> {
        self.with_staged(|a| a.industry_metadata = Some(metadata.clone()))
    }

    fn stage_metadata(&self, metadata: &RunMetadata) -> Result<(), ArtifactError> {
        self.with_staged(|a| a.metadata.push(metadata.clone()))
    }

    fn commit(&self) -> Result<(), ArtifactError> {
        let staged = self.with_staged(std::mem::take)?;
        self.with_inner(|a| {
            if staged.panel.is_some() {
                a.panel = staged.panel;
            }
            if staged.industry.is_some() {
                a.industry = staged.industry;
            }
            if staged.industry_metadata.is_some() {
                a.industry_metadata = staged.industry_metadata;
            }
            a.metadata.extend(staged.metadata);
        })
    }

    fn abort(&self) {
        let _ = self.with_staged(std::mem::take);
    }

    fn write_metadata(&self, metadata: &RunMetadata) -> Result<(), ArtifactError> {
        self.with_inner(|a| a.metadata.push(metadata.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_days_matches_unix_epoch() {
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()), 1);
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()), 19_724);
    }

    #[test]
    fn tmp_path_keeps_directory() {
        let tmp = tmp_path(Path::new("out/features.parquet"));
        assert_eq!(tmp, PathBuf::from("out/features.parquet.tmp"));
    }

    #[test]
    fn empty_industry_frame_has_all_columns() {
        let cfg = IndicatorConfig::default();
        let df = industry_frame(&[], &cfg).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), industry_columns(&cfg).len());
    }

    #[test]
    fn failing_sink_still_records_metadata_only() {
        let sink = MemorySink::failing_tables();
        assert!(sink.stage_industry(&[], &IndicatorConfig::default()).is_err());
        assert!(sink.snapshot().industry.is_none());
    }

    #[test]
    fn memory_sink_publishes_only_on_commit() {
        let sink = MemorySink::new();
        sink.stage_industry(&[], &IndicatorConfig::default()).unwrap();
        assert!(sink.snapshot().industry.is_none());
        assert!(sink.staged().industry.is_some());

        sink.commit().unwrap();
        assert!(sink.snapshot().industry.is_some());
        assert!(sink.staged().industry.is_none());
    }

    #[test]
    fn memory_sink_abort_discards_staged() {
        let sink = MemorySink::new();
        sink.stage_industry(&[], &IndicatorConfig::default()).unwrap();
        sink.abort();
        sink.commit().unwrap();
        assert!(sink.snapshot().industry.is_none());
    }

    fn industry_sink(dir: &Path) -> ParquetArtifactSink {
        ParquetArtifactSink::new(OutputConfig {
            dir: dir.to_path_buf(),
            ..OutputConfig::default()
        })
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn staged_tables_stay_hidden_until_commit() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = industry_sink(tmp.path());
        let info = sink.stage_industry(&[], &IndicatorConfig::default()).unwrap();
        assert!(info.path.unwrap().ends_with("industry.parquet"));
        assert!(!sink.output().industry_path().exists());
        assert_eq!(entries(tmp.path()), vec!["industry.parquet.tmp"]);

        sink.commit().unwrap();
        assert_eq!(entries(tmp.path()), vec!["industry.parquet"]);
    }

    #[test]
    fn abort_removes_staged_files() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = industry_sink(tmp.path());
        sink.stage_industry(&[], &IndicatorConfig::default()).unwrap();
        sink.abort();
        assert!(entries(tmp.path()).is_empty());
    }

    #[test]
    fn failed_commit_rolls_back_published_files() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = industry_sink(tmp.path());
        // A directory in the way of the metadata document blocks its rename.
        fs::create_dir_all(sink.output().industry_metadata_path()).unwrap();
        sink.stage_industry(&[], &IndicatorConfig::default()).unwrap();
        let json_tmp = stage_json(&serde_json::json!({"rows": 0}), &sink.output().industry_metadata_path())
            .unwrap();
        sink.push_staged(json_tmp, sink.output().industry_metadata_path()).unwrap();

        assert!(sink.commit().is_err());
        assert!(!sink.output().industry_path().exists());
        assert_eq!(entries(tmp.path()), vec!["industry.meta.json"]);
        assert!(sink.output().industry_metadata_path().is_dir());
    }
}
