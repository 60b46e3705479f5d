//! StrengthLab Runner — build orchestration, feeds, artifacts, and run metadata.
//!
//! This crate builds on `strengthlab-core` to provide:
//! - Serializable build configuration with a content-addressed run id
//! - Reference instrument feeds (local files, seeded synthetic series)
//! - The fail-fast build orchestrator on a bounded worker pool
//! - Parquet/JSON artifact sinks and run metadata documents

pub mod artifacts;
pub mod config;
pub mod error;
pub mod feeds;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
pub mod timing;

pub use artifacts::{ArtifactError, ArtifactSink, MemoryArtifacts, MemorySink, ParquetArtifactSink};
pub use config::{BuildConfig, ConfigError, OutputConfig, RunId};
pub use error::{RunError, Stage, StageError};
pub use feeds::{LocalFileFeed, SyntheticFeed};
pub use metadata::{
    DataFileInfo, EnvInfo, ErrorPayload, IndustryMetadata, RunMetadata, RunStatus,
};
pub use orchestrator::{run_build, BuildOutcome};
pub use progress::{BuildProgress, CountingProgress, TracingProgress};
pub use timing::StageTimings;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BuildConfig>();
        assert_sync::<BuildConfig>();
        assert_send::<OutputConfig>();
        assert_sync::<OutputConfig>();
    }

    #[test]
    fn run_error_is_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }

    #[test]
    fn metadata_is_send_sync() {
        assert_send::<RunMetadata>();
        assert_sync::<RunMetadata>();
        assert_send::<IndustryMetadata>();
        assert_sync::<IndustryMetadata>();
    }

    #[test]
    fn sinks_are_send_sync() {
        assert_send::<ParquetArtifactSink>();
        assert_sync::<ParquetArtifactSink>();
        assert_send::<MemorySink>();
        assert_sync::<MemorySink>();
    }

    #[test]
    fn feeds_are_send_sync() {
        assert_send::<LocalFileFeed>();
        assert_sync::<LocalFileFeed>();
        assert_send::<SyntheticFeed>();
        assert_sync::<SyntheticFeed>();
    }

    #[test]
    fn build_outcome_is_send_sync() {
        assert_send::<BuildOutcome>();
        assert_sync::<BuildOutcome>();
    }
}
