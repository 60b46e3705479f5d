//! Data layer: feed trait and standardization.

pub mod feed;
pub mod standardize;

pub use feed::{FeedError, InstrumentFeed, InstrumentUniverse, RawSeries};
pub use standardize::{ColumnAliases, ColumnStandardizer, Standardizer};
