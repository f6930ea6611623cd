//! Backend-agnostic metrics via a pluggable sink.
//!
//! The engine reports every evaluation and every reload to a process-wide
//! [`MetricsSink`]. Until [`set_sink`] is called a no-op sink is used, so
//! collecting nothing costs nothing.
//!
//! ```ignore
//! use canopy::metrics::{EvaluationStats, MetricsSink, ReloadStats};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! struct Counter(AtomicU64);
//!
//! impl MetricsSink for Counter {
//!     fn on_evaluation(&self, _stats: &EvaluationStats) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//!
//!     fn on_reload(&self, stats: &ReloadStats) {
//!         eprintln!("loaded {} policies ({})", stats.policy_count, stats.hash);
//!     }
//! }
//!
//! canopy::metrics::set_sink(Arc::new(Counter(AtomicU64::new(0))));
//! ```

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime};
use tracing::warn;

/// Summary of one `PolicyEngine::evaluate` call.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationStats {
    /// Wall-clock time of the whole call.
    pub duration: Duration,
    pub allowed: bool,
    /// Number of policies that failed to evaluate.
    pub errors: usize,
    /// Principal uid, e.g. `User::"alice"`.
    pub principal_id: String,
    /// Action uid, e.g. `Action::"view"`.
    pub action_id: String,
}

/// Per-phase timings of one evaluation, in milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationPhases {
    /// Acquiring the current policy snapshot.
    pub snapshot_ms: f64,
    /// Running every policy against the request.
    pub authorize_ms: f64,
    pub total_ms: f64,
}

impl EvaluationPhases {
    /// Time not attributed to a measured phase.
    pub fn overhead_ms(&self) -> f64 {
        self.total_ms - (self.snapshot_ms + self.authorize_ms)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadStats {
    pub reload_time: SystemTime,
    pub policy_count: usize,
    /// Hash of the new policy source.
    pub hash: String,
}

/// Receiver of engine metrics.
///
/// Called synchronously on the evaluation path from any thread, so
/// implementations must be cheap and thread-safe.
pub trait MetricsSink: Send + Sync {
    fn on_evaluation(&self, stats: &EvaluationStats);

    fn on_reload(&self, stats: &ReloadStats);

    /// Phase breakdown of an evaluation. Ignored unless overridden.
    fn on_evaluation_phases(&self, _stats: &EvaluationStats, _phases: &EvaluationPhases) {}
}

struct NoOpSink;

impl MetricsSink for NoOpSink {
    fn on_evaluation(&self, _stats: &EvaluationStats) {}
    fn on_reload(&self, _stats: &ReloadStats) {}
}

static SINK: OnceLock<Arc<dyn MetricsSink>> = OnceLock::new();

fn sink() -> &'static Arc<dyn MetricsSink> {
    SINK.get_or_init(|| Arc::new(NoOpSink))
}

/// Install the global sink. Only the first call, made before the first
/// evaluation, takes effect; later calls are logged and ignored.
pub fn set_sink(sink: Arc<dyn MetricsSink>) {
    if SINK.set(sink).is_err() {
        warn!(
            event = "Metrics",
            phase = "SetSink",
            "metrics sink already initialized, ignoring set_sink"
        );
    }
}

pub(crate) fn record_evaluation(stats: EvaluationStats, phases: EvaluationPhases) {
    let sink = sink();
    sink.on_evaluation(&stats);
    sink.on_evaluation_phases(&stats, &phases);
}

pub(crate) fn record_reload(policy_count: usize, hash: String) {
    sink().on_reload(&ReloadStats {
        reload_time: SystemTime::now(),
        policy_count,
        hash,
    });
}
