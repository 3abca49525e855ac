use crate::metrics::counters::BulkOps;
use crate::metrics::outcome::{CacheOperation, CacheOutcome, MAX_OUTCOMES};

/// Point-in-time copy of [`OutcomeCounters`](crate::metrics::counters::OutcomeCounters).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeSnapshot {
    counts: [[u64; MAX_OUTCOMES]; CacheOperation::COUNT],
}

impl OutcomeSnapshot {
    pub(crate) fn from_table(counts: [[u64; MAX_OUTCOMES]; CacheOperation::COUNT]) -> Self {
        Self { counts }
    }

    pub fn count(&self, outcome: impl Into<CacheOutcome>) -> u64 {
        let (row, col) = outcome.into().slot();
        self.counts[row][col]
    }

    /// Sum over every outcome of `operation`.
    pub fn total(&self, operation: CacheOperation) -> u64 {
        self.counts[operation as usize].iter().sum()
    }

    /// Every `(outcome, count)` pair, grouped by operation.
    pub fn iter(&self) -> impl Iterator<Item = (CacheOutcome, u64)> + '_ {
        CacheOperation::ALL
            .iter()
            .flat_map(|op| op.outcomes())
            .map(|outcome| (outcome, self.count(outcome)))
    }
}

/// Point-in-time copy of [`BulkMethodEntries`](crate::metrics::counters::BulkMethodEntries).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BulkEntriesSnapshot {
    counts: [u64; BulkOps::COUNT],
}

impl BulkEntriesSnapshot {
    pub(crate) fn from_counts(counts: [u64; BulkOps::COUNT]) -> Self {
        Self { counts }
    }

    pub fn get(&self, op: BulkOps) -> u64 {
        self.counts[op as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (BulkOps, u64)> + '_ {
        BulkOps::ALL.iter().map(|op| (*op, self.get(*op)))
    }
}
