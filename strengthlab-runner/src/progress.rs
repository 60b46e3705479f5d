//! Per-instrument progress reporting.

use crate::error::StageError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use strengthlab_core::domain::InstrumentId;

/// Callbacks fired from worker threads while instruments are processed.
pub trait BuildProgress: Send + Sync {
    /// Called when an instrument starts.
    fn on_start(&self, instrument: &InstrumentId, index: usize, total: usize);

    /// Called when an instrument finishes; `Ok` carries its row count.
    fn on_complete(
        &self,
        instrument: &InstrumentId,
        index: usize,
        total: usize,
        result: Result<usize, &StageError>,
    );

    /// Called once after every dispatched instrument settled.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Default reporter: logs through `tracing`.
#[derive(Debug, Default)]
pub struct TracingProgress;

impl BuildProgress for TracingProgress {
    fn on_start(&self, instrument: &InstrumentId, index: usize, total: usize) {
        tracing::debug!(%instrument, n = index + 1, total, "processing instrument");
    }

    fn on_complete(
        &self,
        instrument: &InstrumentId,
        index: usize,
        total: usize,
        result: Result<usize, &StageError>,
    ) {
        match result {
            Ok(rows) => tracing::debug!(%instrument, n = index + 1, total, rows, "instrument done"),
            Err(e) => tracing::warn!(%instrument, n = index + 1, total, error = %e, "instrument failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!(succeeded, failed, total, "instrument batch complete");
    }
}

/// Counts callbacks; handy in tests and for callers that poll.
#[derive(Debug, Default)]
pub struct CountingProgress {
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    batch: Mutex<Option<(usize, usize, usize)>>,
}

impl CountingProgress {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// `(succeeded, failed, total)` of the last batch, if one finished.
    pub fn batch(&self) -> Option<(usize, usize, usize)> {
        self.batch.lock().ok().and_then(|b| *b)
    }
}

impl BuildProgress for CountingProgress {
    fn on_start(&self, _instrument: &InstrumentId, _index: usize, _total: usize) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn on_complete(
        &self,
        _instrument: &InstrumentId,
        _index: usize,
        _total: usize,
        result: Result<usize, &StageError>,
    ) {
        match result {
            Ok(_) => self.completed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        if let Ok(mut batch) = self.batch.lock() {
            *batch = Some((succeeded, failed, total));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_progress_tallies() {
        let p = CountingProgress::default();
        let id = InstrumentId::new("A");
        p.on_start(&id, 0, 2);
        p.on_complete(&id, 0, 2, Ok(10));
        p.on_start(&id, 1, 2);
        p.on_complete(&id, 1, 2, Err(&StageError::Cancelled));
        p.on_batch_complete(1, 1, 2);
        assert_eq!(p.started(), 2);
        assert_eq!(p.completed(), 1);
        assert_eq!(p.failed(), 1);
        assert_eq!(p.batch(), Some((1, 1, 2)));
    }

    #[test]
    fn progress_is_object_safe() {
        let reporters: Vec<Box<dyn BuildProgress>> =
            vec![Box::new(TracingProgress), Box::new(CountingProgress::default())];
        assert_eq!(reporters.len(), 2);
    }
}
