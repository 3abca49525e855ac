//! # Metrics Traits
//!
//! Recording, snapshotting, and export are split into small traits, so the
//! cache only ever depends on the recording side.
//!
//! ```text
//!   Cache ──record(outcome)──▶ OutcomeRecorder
//!                                   │
//!                 ┌─────────────────┴─────────────────┐
//!                 ▼                                   ▼
//!   MetricsSnapshotProvider<S>              MetricsExporter<S>
//!   (tests, benches)                        (production monitoring)
//! ```

use std::sync::Arc;

use crate::metrics::outcome::CacheOutcome;

/// Sink for operation outcomes. Fire-and-forget: implementations must not
/// fail and should not block.
pub trait OutcomeRecorder: Send + Sync {
    fn record(&self, outcome: CacheOutcome);
}

/// Recorder that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl OutcomeRecorder for NoopRecorder {
    #[inline]
    fn record(&self, _outcome: CacheOutcome) {}
}

impl<R: OutcomeRecorder + ?Sized> OutcomeRecorder for Arc<R> {
    #[inline]
    fn record(&self, outcome: CacheOutcome) {
        (**self).record(outcome)
    }
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
