// Metrics hooks for the `matcher` crate.
//
// Callers install a global `MatchMetrics` implementation via [`set_match_metrics`],
// then every `Matcher` reports per-query latency and result counts. This keeps
// instrumentation decoupled from any specific metrics backend.
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::strategy::RetrievalStrategy;

/// Metrics observer for query operations.
pub trait MatchMetrics: Send + Sync {
    /// Record a query that completed without error.
    ///
    /// `tracks_analyzed` is the number of distinct candidate tracks that
    /// reached selection and `hit_count` is the number of entries returned
    /// to the caller (zero for an empty result).
    fn record_query(
        &self,
        strategy: RetrievalStrategy,
        latency: Duration,
        tracks_analyzed: usize,
        hit_count: usize,
    );

    /// Record a query that failed with an error.
    fn record_failure(&self, _strategy: RetrievalStrategy, _latency: Duration) {}
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn MatchMetrics>>> {
    static METRICS: OnceCell<RwLock<Option<Arc<dyn MatchMetrics>>>> = OnceCell::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn MatchMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Install or clear the global match metrics recorder.
///
/// This is typically called once during service startup so all `Matcher`
/// instances share the same metrics backend.
pub fn set_match_metrics(recorder: Option<Arc<dyn MatchMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}
