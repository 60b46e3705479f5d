//! Standardization of provider-native series into canonical records.
//!
//! Providers name their columns differently (English, lowercase, Korean
//! exchange labels). Each canonical field has an alias list; the first alias
//! present in the frame wins.

use super::feed::RawSeries;
use crate::domain::{InstrumentDailyRecord, InstrumentId};
use crate::error::{CoreError, CoreResult};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Turns a raw provider series into a canonical, date-sorted record list.
pub trait Standardizer: Send + Sync {
    fn standardize(
        &self,
        raw: &RawSeries,
        id: &InstrumentId,
    ) -> CoreResult<Vec<InstrumentDailyRecord>>;
}

/// Canonical field → accepted provider column names.
#[derive(Debug, Clone)]
pub struct ColumnAliases {
    pub date: Vec<String>,
    pub open: Vec<String>,
    pub high: Vec<String>,
    pub low: Vec<String>,
    pub close: Vec<String>,
    pub volume: Vec<String>,
    pub trading_value: Vec<String>,
    pub change_pct: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            date: names(&["Date", "date", "날짜", "일자"]),
            open: names(&["Open", "open", "시가"]),
            high: names(&["High", "high", "고가"]),
            low: names(&["Low", "low", "저가"]),
            close: names(&["Close", "close", "종가"]),
            volume: names(&["Volume", "volume", "거래량"]),
            trading_value: names(&["TradingValue", "trading_value", "Amount", "거래대금"]),
            change_pct: names(&["ChangePct", "Change", "change", "등락률"]),
        }
    }
}

/// Alias-driven standardizer for tabular daily series.
#[derive(Debug, Clone, Default)]
pub struct ColumnStandardizer {
    aliases: ColumnAliases,
}

impl ColumnStandardizer {
    pub fn new(aliases: ColumnAliases) -> Self {
        Self { aliases }
    }

    fn find<'a>(&self, df: &'a DataFrame, aliases: &[String]) -> Option<&'a Column> {
        aliases.iter().find_map(|a| df.column(a).ok())
    }

    fn required<'a>(
        &self,
        df: &'a DataFrame,
        field: &str,
        aliases: &[String],
    ) -> CoreResult<&'a Column> {
        self.find(df, aliases).ok_or_else(|| {
            CoreError::Schema(format!(
                "missing required column '{field}' (accepted: {})",
                aliases.join(", ")
            ))
        })
    }
}

impl Standardizer for ColumnStandardizer {
    fn standardize(
        &self,
        raw: &RawSeries,
        id: &InstrumentId,
    ) -> CoreResult<Vec<InstrumentDailyRecord>> {
        if raw.height() == 0 {
            return Err(CoreError::Input(format!("raw series for {id} is empty")));
        }

        let a = &self.aliases;
        let dates = date_values(self.required(raw, "Date", &a.date)?)?;
        let open = float_values(self.required(raw, "Open", &a.open)?)?;
        let high = float_values(self.required(raw, "High", &a.high)?)?;
        let low = float_values(self.required(raw, "Low", &a.low)?)?;
        let close = float_values(self.required(raw, "Close", &a.close)?)?;
        let volume = float_values(self.required(raw, "Volume", &a.volume)?)?;
        let trading_value = match self.find(raw, &a.trading_value) {
            Some(c) => float_values(c)?,
            None => vec![None; raw.height()],
        };
        let change_pct = match self.find(raw, &a.change_pct) {
            Some(c) => float_values(c)?,
            None => vec![None; raw.height()],
        };

        let mut records: Vec<InstrumentDailyRecord> = (0..raw.height())
            .filter_map(|i| {
                let date = dates[i]?;
                let close = close[i].filter(|c| !c.is_nan())?;
                Some(InstrumentDailyRecord {
                    instrument: id.clone(),
                    date,
                    open: open[i].unwrap_or(f64::NAN),
                    high: high[i].unwrap_or(f64::NAN),
                    low: low[i].unwrap_or(f64::NAN),
                    close,
                    volume: volume[i].unwrap_or(f64::NAN),
                    trading_value: trading_value[i],
                    change_pct: change_pct[i],
                })
            })
            .collect();

        // Stable sort, then keep the last row of each date.
        records.sort_by_key(|r| r.date);
        let mut deduped: Vec<InstrumentDailyRecord> = Vec::with_capacity(records.len());
        for r in records {
            match deduped.last_mut() {
                Some(last) if last.date == r.date => *last = r,
                _ => deduped.push(r),
            }
        }

        if deduped.is_empty() {
            return Err(CoreError::Input(format!(
                "no valid rows after standardization for {id}"
            )));
        }
        Ok(deduped)
    }
}

fn schema_err(e: PolarsError) -> CoreError {
    CoreError::Schema(e.to_string())
}

/// Numeric column as `Option<f64>`; unparsable values become `None`.
fn float_values(col: &Column) -> CoreResult<Vec<Option<f64>>> {
    let cast = col.cast(&DataType::Float64).map_err(schema_err)?;
    let ca = cast.f64().map_err(schema_err)?;
    Ok(ca.into_iter().collect())
}

/// Date column as `Option<NaiveDate>`.
///
/// Accepts Date, Datetime, `%Y%m%d` integers, and strings in `%Y-%m-%d`,
/// `%Y%m%d` or `%Y-%m-%d %H:%M:%S` form. A non-null value that cannot be
/// parsed is an input error.
fn date_values(col: &Column) -> CoreResult<Vec<Option<NaiveDate>>> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .ok_or_else(|| CoreError::Input("invalid epoch".into()))?;
    let from_days = |days: i32| epoch + chrono::Duration::days(days as i64);

    match col.dtype() {
        DataType::Date => {
            let ca = col.date().map_err(schema_err)?;
            Ok((0..col.len()).map(|i| ca.get(i).map(from_days)).collect())
        }
        DataType::Datetime(_, _) => {
            let cast = col.cast(&DataType::Date).map_err(schema_err)?;
            let ca = cast.date().map_err(schema_err)?;
            Ok((0..cast.len()).map(|i| ca.get(i).map(from_days)).collect())
        }
        DataType::String => {
            let ca = col.as_materialized_series().str().map_err(schema_err)?;
            ca.into_iter()
                .map(|v| v.map(parse_date_str).transpose())
                .collect()
        }
        dt if dt.is_integer() => {
            let cast = col.cast(&DataType::Int64).map_err(schema_err)?;
            let ca = cast.i64().map_err(schema_err)?;
            ca.into_iter()
                .map(|v| v.map(|n| parse_date_str(&n.to_string())).transpose())
                .collect()
        }
        other => Err(CoreError::Schema(format!(
            "unsupported Date column type {other}"
        ))),
    }
}

fn parse_date_str(s: &str) -> CoreResult<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .map_err(|_| CoreError::Input(format!("unparsable date '{s}'")))
}
