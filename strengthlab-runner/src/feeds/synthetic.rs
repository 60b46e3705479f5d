//! Seeded synthetic instrument feed.
//!
//! Every instrument is a weekday random walk seeded from the BLAKE3 hash of
//! its id, so the same id always yields the same series. The master assigns
//! industries round-robin; every seventh instrument has no large category
//! and every tenth trades on the wrapper market.

use crate::artifacts::date_column;
use chrono::{Datelike, NaiveDate, Weekday};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use strengthlab_core::data::{FeedError, InstrumentFeed, InstrumentUniverse, RawSeries};
use strengthlab_core::domain::{InstrumentId, MasterRecord};

const LARGE_CATEGORIES: [&str; 5] = [
    "Semiconductors",
    "Financials",
    "Energy",
    "Healthcare",
    "Consumer",
];

#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    count: usize,
}

impl SyntheticFeed {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    fn code(index: usize) -> String {
        format!("{:06}", index + 1)
    }

    fn market(index: usize) -> &'static str {
        match index % 10 {
            9 => "ETF",
            i if i % 2 == 0 => "KOSPI",
            _ => "KOSDAQ",
        }
    }

    fn master_record(index: usize) -> MasterRecord {
        let large = LARGE_CATEGORIES[index % LARGE_CATEGORIES.len()];
        let mid = format!("{large} {}", (index / LARGE_CATEGORIES.len()) % 3 + 1);
        MasterRecord {
            code: Self::code(index),
            name: Some(format!("Synthetic {}", index + 1)),
            market: Some(Self::market(index).to_string()),
            industry_large: (index % 7 != 6).then(|| large.to_string()),
            industry_mid: Some(mid.clone()),
            industry_small: (index % 4 != 3).then(|| format!("{mid}-{}", index % 2)),
            shares_outstanding: Some(1_000_000 + index as u64 * 10_000),
        }
    }
}

impl InstrumentFeed for SyntheticFeed {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn list_instruments(
        &self,
        _as_of: Option<NaiveDate>,
        market: Option<&str>,
    ) -> Result<InstrumentUniverse, FeedError> {
        let mut instruments = Vec::new();
        let mut markets = HashMap::new();
        for i in 0..self.count {
            let label = Self::market(i);
            if market.is_some_and(|m| !m.eq_ignore_ascii_case(label)) {
                continue;
            }
            let id = InstrumentId::new(Self::code(i));
            markets.insert(id.clone(), label.to_string());
            instruments.push(id);
        }
        Ok(InstrumentUniverse {
            instruments,
            markets,
        })
    }

    fn load_taxonomy_master(
        &self,
        _as_of: Option<NaiveDate>,
    ) -> Result<Vec<MasterRecord>, FeedError> {
        Ok((0..self.count).map(Self::master_record).collect())
    }

    fn fetch_daily_series(
        &self,
        id: &InstrumentId,
        start: NaiveDate,
        end: NaiveDate,
        _adjusted: bool,
    ) -> Result<RawSeries, FeedError> {
        random_walk_frame(id, start, end).map_err(|e| FeedError::Other(e.to_string()))
    }
}

/// Weekday random walk over `[start, end]`, starting at 100.
fn random_walk_frame(id: &InstrumentId, start: NaiveDate, end: NaiveDate) -> PolarsResult<DataFrame> {
    let seed: [u8; 32] = *blake3::hash(id.as_str().as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut dates = Vec::new();
    let mut opens = Vec::new();
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    let mut closes = Vec::new();
    let mut volumes = Vec::new();
    let mut values = Vec::new();

    let mut price = 100.0_f64;
    let mut current = start;
    while current <= end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        dates.push(current);
        opens.push(open);
        highs.push(high);
        lows.push(low);
        closes.push(close);
        volumes.push(volume);
        values.push(close * volume as f64);

        price = close;
        current += chrono::Duration::days(1);
    }

    DataFrame::new(vec![
        date_column("Date", dates.into_iter())?,
        Column::new("Open".into(), opens),
        Column::new("High".into(), highs),
        Column::new("Low".into(), lows),
        Column::new("Close".into(), closes),
        Column::new("Volume".into(), volumes),
        Column::new("TradingValue".into(), values),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use strengthlab_core::data::{ColumnStandardizer, Standardizer};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn series_is_deterministic_per_id() {
        let feed = SyntheticFeed::new(3);
        let id = InstrumentId::new("000001");
        let a = feed.fetch_daily_series(&id, d(2024, 1, 1), d(2024, 3, 1), true).unwrap();
        let b = feed.fetch_daily_series(&id, d(2024, 1, 1), d(2024, 3, 1), true).unwrap();
        assert!(a.equals(&b));

        let other = feed
            .fetch_daily_series(&InstrumentId::new("000002"), d(2024, 1, 1), d(2024, 3, 1), true)
            .unwrap();
        assert!(!a.equals(&other));
    }

    #[test]
    fn weekends_are_skipped() {
        let feed = SyntheticFeed::new(1);
        let id = InstrumentId::new("000001");
        // 2024-01-06/07 is a weekend.
        let raw = feed.fetch_daily_series(&id, d(2024, 1, 1), d(2024, 1, 7), true).unwrap();
        let records = ColumnStandardizer::default().standardize(&raw, &id).unwrap();
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.close > 0.0 && r.high >= r.low));
        assert!(records.iter().all(|r| r.trading_value.is_some()));
    }

    #[test]
    fn dates_are_calendar_dates() {
        let feed = SyntheticFeed::new(1);
        let id = InstrumentId::new("000001");
        let raw = feed.fetch_daily_series(&id, d(2024, 1, 2), d(2024, 1, 3), true).unwrap();
        let dates = raw.column("Date").unwrap();
        assert_eq!(dates.dtype(), &DataType::Date);
        let days: Vec<i32> = dates
            .cast(&DataType::Int32)
            .unwrap()
            .i32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(days, vec![19_724, 19_725]);
    }

    #[test]
    fn master_covers_unknown_and_wrapper_cases() {
        let master = SyntheticFeed::new(10).load_taxonomy_master(None).unwrap();
        assert_eq!(master.len(), 10);
        assert!(master[6].industry_large.is_none());
        assert_eq!(master[9].market.as_deref(), Some("ETF"));
        assert!(master[3].industry_small.is_none());
    }

    #[test]
    fn market_filter_applies() {
        let feed = SyntheticFeed::new(10);
        let etf = feed.list_instruments(None, Some("ETF")).unwrap();
        assert_eq!(etf.len(), 1);
        assert_eq!(etf.instruments[0].as_str(), "000010");
        assert_eq!(feed.list_instruments(None, None).unwrap().len(), 10);
    }
}
