//! Stage timing for build runs.
//!
//! Each pipeline stage is measured once and recorded under a stable key;
//! the collected seconds end up in the run metadata and in the log.
//!
//! ```
//! use strengthlab_runner::timing::StageTimings;
//!
//! let mut timings = StageTimings::new();
//! let rows = timings.measure("concat_and_sort", || 42);
//! assert_eq!(rows, 42);
//! assert!(timings.get("concat_and_sort").is_some());
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Key under which the whole run is recorded.
pub const TOTAL_KEY: &str = "total";

/// Run a closure and return its result along with its duration.
pub fn profile<F, R>(f: F) -> (R, Duration)
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

/// Seconds spent per stage, in insertion-independent key order.
#[derive(Debug, Clone)]
pub struct StageTimings {
    started: Instant,
    seconds: BTreeMap<String, f64>,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTimings {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            seconds: BTreeMap::new(),
        }
    }

    /// Time `f` and record it under `key`. Repeated keys accumulate.
    pub fn measure<F, R>(&mut self, key: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let (result, elapsed) = profile(f);
        self.record(key, elapsed);
        result
    }

    pub fn record(&mut self, key: &str, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        *self.seconds.entry(key.to_string()).or_insert(0.0) += secs;
        tracing::info!(stage = key, seconds = round3(secs), "stage finished");
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.seconds.get(key).copied()
    }

    /// Snapshot with the running total, rounded to milliseconds.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        let mut out: BTreeMap<String, f64> = self
            .seconds
            .iter()
            .map(|(k, v)| (k.clone(), round3(*v)))
            .collect();
        out.insert(TOTAL_KEY.to_string(), round3(self.started.elapsed().as_secs_f64()));
        out
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_returns_result() {
        let (value, elapsed) = profile(|| 6 * 7);
        assert_eq!(value, 42);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn repeated_keys_accumulate() {
        let mut t = StageTimings::new();
        t.record("fetch", Duration::from_millis(250));
        t.record("fetch", Duration::from_millis(500));
        assert!((t.get("fetch").unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn snapshot_includes_total() {
        let mut t = StageTimings::new();
        t.measure("benchmark_fetch", || ());
        let snap = t.snapshot();
        assert!(snap.contains_key("benchmark_fetch"));
        assert!(snap.contains_key(TOTAL_KEY));
    }
}
