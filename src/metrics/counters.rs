//! Lock-free counters: per-outcome tallies and bulk method entry counts.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::outcome::{CacheOperation, CacheOutcome, MAX_OUTCOMES};
use crate::metrics::snapshot::{BulkEntriesSnapshot, OutcomeSnapshot};
use crate::metrics::traits::{MetricsSnapshotProvider, OutcomeRecorder};

/// Counts every reported outcome.
pub struct OutcomeCounters {
    table: [[AtomicU64; MAX_OUTCOMES]; CacheOperation::COUNT],
}

impl OutcomeCounters {
    pub fn new() -> Self {
        Self {
            table: std::array::from_fn(|_| std::array::from_fn(|_| AtomicU64::new(0))),
        }
    }

    /// Current count for a single outcome.
    pub fn count(&self, outcome: impl Into<CacheOutcome>) -> u64 {
        let (row, col) = outcome.into().slot();
        self.table[row][col].load(Ordering::Relaxed)
    }
}

impl Default for OutcomeCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeRecorder for OutcomeCounters {
    #[inline]
    fn record(&self, outcome: CacheOutcome) {
        let (row, col) = outcome.slot();
        self.table[row][col].fetch_add(1, Ordering::Relaxed);
    }
}

impl MetricsSnapshotProvider<OutcomeSnapshot> for OutcomeCounters {
    fn snapshot(&self) -> OutcomeSnapshot {
        let mut counts = [[0u64; MAX_OUTCOMES]; CacheOperation::COUNT];
        for (row, cells) in self.table.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                counts[row][col] = cell.load(Ordering::Relaxed);
            }
        }
        OutcomeSnapshot::from_table(counts)
    }
}

impl fmt::Debug for OutcomeCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeCounters")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Kinds of bulk method entries counted by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOps {
    GetAllHits,
    GetAllMiss,
    PutAll,
    UpdateAll,
    RemoveAll,
}

impl BulkOps {
    pub const ALL: &'static [BulkOps] = &[
        BulkOps::GetAllHits,
        BulkOps::GetAllMiss,
        BulkOps::PutAll,
        BulkOps::UpdateAll,
        BulkOps::RemoveAll,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn name(self) -> &'static str {
        match self {
            BulkOps::GetAllHits => "get_all_hits",
            BulkOps::GetAllMiss => "get_all_miss",
            BulkOps::PutAll => "put_all",
            BulkOps::UpdateAll => "update_all",
            BulkOps::RemoveAll => "remove_all",
        }
    }
}

/// Monotonic per-[`BulkOps`] entry counts. Never reset.
#[derive(Debug, Default)]
pub struct BulkMethodEntries {
    counts: [AtomicU64; BulkOps::COUNT],
}

impl BulkMethodEntries {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&self, op: BulkOps, count: u64) {
        self.counts[op as usize].fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self, op: BulkOps) -> u64 {
        self.counts[op as usize].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> BulkEntriesSnapshot {
        let mut counts = [0u64; BulkOps::COUNT];
        for op in BulkOps::ALL {
            counts[*op as usize] = self.get(*op);
        }
        BulkEntriesSnapshot::from_counts(counts)
    }
}
