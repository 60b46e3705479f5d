//! Run errors tagged with the pipeline stage and instrument that failed.

use crate::artifacts::ArtifactError;
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use strengthlab_core::data::FeedError;
use strengthlab_core::domain::InstrumentId;
use strengthlab_core::CoreError;
use thiserror::Error;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Config,
    Universe,
    Benchmark,
    Fetch,
    Standardize,
    Compute,
    Assemble,
    Industry,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Universe => "universe",
            Stage::Benchmark => "benchmark",
            Stage::Fetch => "fetch",
            Stage::Standardize => "standardize",
            Stage::Compute => "compute",
            Stage::Assemble => "assemble",
            Stage::Industry => "industry",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying cause of a stage failure.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("worker pool error: {0}")]
    Pool(String),

    #[error("cancelled after an earlier failure")]
    Cancelled,
}

impl StageError {
    /// Stable error-kind name recorded in failure metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Config(_) => "ConfigError",
            StageError::Feed(e) => e.kind(),
            StageError::Core(e) => e.kind(),
            StageError::Artifact(_) => "ArtifactError",
            StageError::Pool(_) => "PoolError",
            StageError::Cancelled => "Cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StageError::Cancelled)
    }
}

/// A failed build: which stage, which instrument (if any), and why.
#[derive(Debug, Error)]
#[error("{} stage failed{}: {}", .stage, instrument_suffix(.instrument), .source)]
pub struct RunError {
    pub stage: Stage,
    pub instrument: Option<InstrumentId>,
    #[source]
    pub source: StageError,
}

fn instrument_suffix(instrument: &Option<InstrumentId>) -> String {
    instrument
        .as_ref()
        .map(|id| format!(" for {id}"))
        .unwrap_or_default()
}

impl RunError {
    pub fn new(stage: Stage, instrument: Option<InstrumentId>, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            instrument,
            source: source.into(),
        }
    }

    /// Stage-level failure not tied to one instrument.
    pub fn at(stage: Stage, source: impl Into<StageError>) -> Self {
        Self::new(stage, None, source)
    }

    /// Per-instrument failure.
    pub fn for_instrument(stage: Stage, id: &InstrumentId, source: impl Into<StageError>) -> Self {
        Self::new(stage, Some(id.clone()), source)
    }

    pub fn cancelled(stage: Stage, id: &InstrumentId) -> Self {
        Self::for_instrument(stage, id, StageError::Cancelled)
    }

    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }
}
