//! Instrument feed trait and structured error types.
//!
//! The feed abstracts over market-data sources (local files, synthetic
//! series, remote APIs) so the pipeline can swap implementations and mock
//! them in tests. Retries and timeouts belong to the feed, not the core.

use crate::domain::{InstrumentId, MasterRecord};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::collections::HashMap;
use thiserror::Error;

/// Provider-native daily series, before standardization.
pub type RawSeries = DataFrame;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited by feed (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("instrument not found: {instrument}")]
    NotFound { instrument: String },

    #[error("malformed feed data: {0}")]
    Malformed(String),

    #[error("feed I/O error: {0}")]
    Io(String),

    #[error("feed error: {0}")]
    Other(String),
}

impl FeedError {
    /// Stable name of the error kind, used in run metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::Unavailable(_) => "FeedUnavailable",
            FeedError::RateLimited { .. } => "FeedRateLimited",
            FeedError::NotFound { .. } => "FeedNotFound",
            FeedError::Malformed(_) => "FeedMalformed",
            FeedError::Io(_) => "FeedIo",
            FeedError::Other(_) => "FeedError",
        }
    }
}

impl From<std::io::Error> for FeedError {
    fn from(e: std::io::Error) -> Self {
        FeedError::Io(e.to_string())
    }
}

/// Resolved instrument universe: ordered ids plus their market labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentUniverse {
    pub instruments: Vec<InstrumentId>,
    pub markets: HashMap<InstrumentId, String>,
}

impl InstrumentUniverse {
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn market_of(&self, id: &InstrumentId) -> Option<&str> {
        self.markets.get(id).map(String::as_str)
    }

    /// Keep only the first `limit` instruments; `0` keeps everything.
    pub fn truncate(&mut self, limit: usize) {
        if limit == 0 || limit >= self.instruments.len() {
            return;
        }
        self.instruments.truncate(limit);
        let kept: std::collections::HashSet<&InstrumentId> = self.instruments.iter().collect();
        self.markets.retain(|id, _| kept.contains(id));
    }
}

/// Source of instrument universes, taxonomy masters, and raw daily series.
pub trait InstrumentFeed: Send + Sync {
    /// Human-readable name of this feed.
    fn name(&self) -> &str;

    /// Ordered instrument ids, optionally filtered by market label.
    fn list_instruments(
        &self,
        as_of: Option<NaiveDate>,
        market: Option<&str>,
    ) -> Result<InstrumentUniverse, FeedError>;

    /// Taxonomy master table.
    fn load_taxonomy_master(&self, as_of: Option<NaiveDate>)
        -> Result<Vec<MasterRecord>, FeedError>;

    /// Daily series for one instrument over `[start, end]`.
    fn fetch_daily_series(
        &self,
        id: &InstrumentId,
        start: NaiveDate,
        end: NaiveDate,
        adjusted: bool,
    ) -> Result<RawSeries, FeedError>;
}
