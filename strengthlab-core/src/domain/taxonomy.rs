//! Taxonomy master table, per-instrument industry entries and industry keys.

use super::ids::InstrumentId;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const UNKNOWN_INDUSTRY: &str = "Unknown";

/// One row of the instrument master table as supplied by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MasterRecord {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub industry_large: Option<String>,
    #[serde(default)]
    pub industry_mid: Option<String>,
    #[serde(default)]
    pub industry_small: Option<String>,
    #[serde(default)]
    pub shares_outstanding: Option<u64>,
}

impl MasterRecord {
    pub fn market_label(&self) -> &str {
        self.market.as_deref().map(str::trim).unwrap_or("")
    }
}

/// Normalized industry classification of one instrument.
///
/// Blank levels are stored as `""` and rendered as `Unknown` only when a
/// key is built, each at its own granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub large: String,
    pub mid: String,
    pub small: String,
}

impl TaxonomyEntry {
    pub fn new(large: Option<&str>, mid: Option<&str>, small: Option<&str>) -> Self {
        Self {
            large: normalize_industry_value(large),
            mid: normalize_industry_value(mid),
            small: normalize_industry_value(small),
        }
    }

    pub fn from_master(record: &MasterRecord) -> Self {
        Self::new(
            record.industry_large.as_deref(),
            record.industry_mid.as_deref(),
            record.industry_small.as_deref(),
        )
    }
}

/// Trim, and treat the textual null spellings as blank.
pub fn normalize_industry_value(v: Option<&str>) -> String {
    let s = v.map(str::trim).unwrap_or("");
    if s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("none") {
        String::new()
    } else {
        s.to_string()
    }
}

fn or_unknown(s: &str) -> String {
    if s.is_empty() {
        UNKNOWN_INDUSTRY.to_string()
    } else {
        s.to_string()
    }
}

/// Taxonomy granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndustryLevel {
    /// Large only.
    L,
    /// Large + Mid.
    LM,
    /// Large + Mid + Small.
    LMS,
}

impl IndustryLevel {
    pub const ALL: [IndustryLevel; 3] = [IndustryLevel::L, IndustryLevel::LM, IndustryLevel::LMS];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndustryLevel::L => "L",
            IndustryLevel::LM => "LM",
            IndustryLevel::LMS => "LMS",
        }
    }
}

impl fmt::Display for IndustryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndustryLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(IndustryLevel::L),
            "LM" => Ok(IndustryLevel::LM),
            "LMS" => Ok(IndustryLevel::LMS),
            other => Err(CoreError::Aggregation(format!(
                "invalid industry level: {other}"
            ))),
        }
    }
}

/// Level-specific composite key: (Large), (Large, Mid) or (Large, Mid, Small).
///
/// Every component is already `Unknown`-substituted. Ordering follows
/// (large, mid, small), which is also the output sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndustryKey {
    pub large: String,
    pub mid: Option<String>,
    pub small: Option<String>,
}

impl IndustryKey {
    pub fn for_level(entry: &TaxonomyEntry, level: IndustryLevel) -> Self {
        let large = or_unknown(&entry.large);
        match level {
            IndustryLevel::L => Self {
                large,
                mid: None,
                small: None,
            },
            IndustryLevel::LM => Self {
                large,
                mid: Some(or_unknown(&entry.mid)),
                small: None,
            },
            IndustryLevel::LMS => Self {
                large,
                mid: Some(or_unknown(&entry.mid)),
                small: Some(or_unknown(&entry.small)),
            },
        }
    }

    /// Display labels; levels coarser than the key render as `""`.
    pub fn labels(&self) -> (String, String, String) {
        (
            self.large.clone(),
            self.mid.clone().unwrap_or_default(),
            self.small.clone().unwrap_or_default(),
        )
    }
}

impl fmt::Display for IndustryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.large)?;
        for part in [&self.mid, &self.small].into_iter().flatten() {
            write!(f, "||{part}")?;
        }
        Ok(())
    }
}

/// Instrument → taxonomy entry, as resolved for one build.
pub type TaxonomyMap = std::collections::HashMap<InstrumentId, TaxonomyEntry>;
