//! Reference instrument feeds.
//!
//! - [`LocalFileFeed`]: master table and per-instrument CSV files on disk
//! - [`SyntheticFeed`]: seeded random walks for development and tests

pub mod local;
pub mod synthetic;

pub use local::LocalFileFeed;
pub use synthetic::SyntheticFeed;
