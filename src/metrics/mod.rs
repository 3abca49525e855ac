//! Outcome reporting.
//!
//! - [`outcome`]: per-operation outcome enumerations.
//! - [`traits`]: recorder / snapshot / exporter seams.
//! - [`counters`]: atomic outcome counters and bulk method entry counts.
//! - [`snapshot`]: point-in-time copies of the counters.
//! - `exporter`: Prometheus text exposition (feature `metrics-export`).

pub mod counters;
#[cfg(feature = "metrics-export")]
pub mod exporter;
pub mod outcome;
pub mod snapshot;
pub mod traits;

pub use counters::{BulkMethodEntries, BulkOps, OutcomeCounters};
pub use outcome::{
    CacheOperation, CacheOutcome, ClearOutcome, ConditionalRemoveOutcome, GetAllOutcome,
    GetOutcome, PutAllOutcome, PutIfAbsentOutcome, PutOutcome, RemoveAllOutcome, RemoveOutcome,
    ReplaceOutcome,
};
pub use snapshot::{BulkEntriesSnapshot, OutcomeSnapshot};
pub use traits::{MetricsExporter, MetricsSnapshotProvider, NoopRecorder, OutcomeRecorder};
