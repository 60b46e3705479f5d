//! Local-file instrument feed.
//!
//! Layout under the feed root:
//!
//! ```text
//! master.json | master.csv     taxonomy master (JSON array or CSV with a header)
//! series/<instrument>.csv      one daily series per instrument
//! ```
//!
//! Series files are returned whole; the orchestrator clips them to the
//! requested date range after standardization. Files are taken as already
//! adjusted (or not), so the `adjusted` flag is not interpreted here.

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use strengthlab_core::data::{FeedError, InstrumentFeed, InstrumentUniverse, RawSeries};
use strengthlab_core::domain::{InstrumentId, MasterRecord};

pub const MASTER_JSON: &str = "master.json";
pub const MASTER_CSV: &str = "master.csv";
pub const SERIES_DIR: &str = "series";

#[derive(Debug, Clone)]
pub struct LocalFileFeed {
    root: PathBuf,
    code_width: Option<usize>,
}

impl LocalFileFeed {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            code_width: None,
        }
    }

    /// Left-pad master codes to `width` when listing instruments.
    pub fn with_code_width(mut self, width: Option<usize>) -> Self {
        self.code_width = width;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn instrument_id(&self, code: &str) -> InstrumentId {
        match self.code_width {
            Some(w) => InstrumentId::padded(code, w),
            None => InstrumentId::new(code),
        }
    }

    fn series_path(&self, id: &InstrumentId) -> PathBuf {
        self.root.join(SERIES_DIR).join(format!("{id}.csv"))
    }

    fn read_master(&self) -> Result<Vec<MasterRecord>, FeedError> {
        let json = self.root.join(MASTER_JSON);
        if json.exists() {
            let file = fs::File::open(&json)?;
            return serde_json::from_reader(BufReader::new(file))
                .map_err(|e| FeedError::Malformed(format!("{}: {e}", json.display())));
        }

        let csv_path = self.root.join(MASTER_CSV);
        if csv_path.exists() {
            let mut reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_path(&csv_path)
                .map_err(|e| FeedError::Io(format!("{}: {e}", csv_path.display())))?;
            return reader
                .deserialize::<MasterRecord>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| FeedError::Malformed(format!("{}: {e}", csv_path.display())));
        }

        Err(FeedError::Unavailable(format!(
            "no {MASTER_JSON} or {MASTER_CSV} under {}",
            self.root.display()
        )))
    }
}

impl InstrumentFeed for LocalFileFeed {
    fn name(&self) -> &str {
        "local"
    }

    /// Sorted, de-duplicated master codes. The snapshot date is ignored: the
    /// directory holds a single snapshot.
    fn list_instruments(
        &self,
        _as_of: Option<NaiveDate>,
        market: Option<&str>,
    ) -> Result<InstrumentUniverse, FeedError> {
        let mut markets: BTreeMap<InstrumentId, String> = BTreeMap::new();
        for record in self.read_master()? {
            let label = record.market_label().to_string();
            if market.is_some_and(|m| !m.eq_ignore_ascii_case(&label)) {
                continue;
            }
            let id = self.instrument_id(&record.code);
            if id.is_empty() {
                continue;
            }
            markets.entry(id).or_insert(label);
        }

        Ok(InstrumentUniverse {
            instruments: markets.keys().cloned().collect(),
            markets: markets.into_iter().collect(),
        })
    }

    fn load_taxonomy_master(
        &self,
        _as_of: Option<NaiveDate>,
    ) -> Result<Vec<MasterRecord>, FeedError> {
        self.read_master()
    }

    fn fetch_daily_series(
        &self,
        id: &InstrumentId,
        _start: NaiveDate,
        _end: NaiveDate,
        _adjusted: bool,
    ) -> Result<RawSeries, FeedError> {
        let path = self.series_path(id);
        if !path.exists() {
            return Err(FeedError::NotFound {
                instrument: id.to_string(),
            });
        }
        LazyCsvReader::new(&path)
            .with_has_header(true)
            .with_try_parse_dates(true)
            .finish()
            .and_then(|lf| lf.collect())
            .map_err(|e| FeedError::Malformed(format!("{}: {e}", path.display())))
    }
}
