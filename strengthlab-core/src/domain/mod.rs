//! Domain types for StrengthLab

pub mod benchmark;
pub mod ids;
pub mod panel;
pub mod record;
pub mod taxonomy;

pub use benchmark::BenchmarkSeries;
pub use ids::InstrumentId;
pub use panel::{IndicatorPanelRow, RawPanel, UniversePanel, RECORD_COLUMNS};
pub use record::{check_series, InstrumentDailyRecord};
pub use taxonomy::{
    normalize_industry_value, IndustryKey, IndustryLevel, MasterRecord, TaxonomyEntry,
    TaxonomyMap, UNKNOWN_INDUSTRY,
};
