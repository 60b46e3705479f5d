//! StrengthLab Core — instrument records, indicators, cross-sectional ranks, industry indices.
//!
//! This crate contains the computational heart of the pipeline:
//! - Domain types (records, benchmark series, panels, taxonomy)
//! - Feed and standardizer traits for provider-native daily series
//! - Per-instrument indicator engine (moving averages, Mansfield RS, new highs)
//! - Cross-sectional percentile normalization
//! - Equal-weight industry aggregation

pub mod cross_section;
pub mod data;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod industry;

pub use error::{CoreError, CoreResult};
