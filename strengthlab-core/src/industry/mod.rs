//! Industry aggregation engine.
//!
//! Equal-weight synthetic indices per taxonomy bucket, with the same
//! relative-strength math as the instrument engine and per-date percentile
//! ranks within each level.

pub mod frame;
pub mod index;
pub mod membership;

pub use frame::{compute_industry_frame, compute_industry_levels, industry_columns, IndustryDailyRow};
pub use index::{equal_weight_universe_benchmark, IndexPoint, INDEX_BASE, UNIVERSE_BENCHMARK_NAME};
pub use membership::IndustryMembership;

use crate::domain::IndustryLevel;
use serde::{Deserialize, Serialize};

/// Market labels treated as non-equity wrappers by default.
pub const DEFAULT_EXCLUDED_MARKETS: [&str; 1] = ["ETF"];

/// Which series the industry indices are measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndustryBenchmarkPolicy {
    /// The same external benchmark instrument the instrument engine uses.
    External,
    /// Equal-weight index over the whole universe panel.
    #[default]
    Universe,
}

impl IndustryBenchmarkPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndustryBenchmarkPolicy::External => "external",
            IndustryBenchmarkPolicy::Universe => "universe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndustryConfig {
    pub enabled: bool,
    pub levels: Vec<IndustryLevel>,
    pub benchmark: IndustryBenchmarkPolicy,
    pub excluded_markets: Vec<String>,
}

impl Default for IndustryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            levels: IndustryLevel::ALL.to_vec(),
            benchmark: IndustryBenchmarkPolicy::default(),
            excluded_markets: DEFAULT_EXCLUDED_MARKETS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_covers_every_level() {
        let cfg = IndustryConfig::default();
        assert_eq!(cfg.levels, IndustryLevel::ALL.to_vec());
        assert_eq!(cfg.benchmark, IndustryBenchmarkPolicy::Universe);
        assert_eq!(cfg.excluded_markets, vec!["ETF".to_string()]);
    }

    #[test]
    fn policy_serializes_snake_case() {
        let json = serde_json::to_string(&IndustryBenchmarkPolicy::External).unwrap();
        assert_eq!(json, "\"external\"");
    }
}
