//! Per-run sync counters.

use std::fmt;

use crate::loader::LoadOutcome;

/// Counts reported by a sync, delete or backfill run for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub entity: String,
    /// Distinct record ids the run was asked to handle.
    pub attempted: usize,
    /// Documents the cluster accepted.
    pub succeeded: usize,
    /// Records that no longer exist in the source.
    pub skipped: usize,
    /// Records that failed to map or that the cluster did not accept.
    pub failed: usize,
    /// Batches that failed as a whole after all retries.
    pub failed_batches: usize,
}

impl SyncReport {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    /// Whether every batch reached the cluster. Item-level faults do not count.
    pub fn is_success(&self) -> bool {
        self.failed_batches == 0
    }

    pub(crate) fn record_load(&mut self, outcome: LoadOutcome) {
        self.succeeded += outcome.succeeded;
        self.failed += outcome.failed;
        self.failed_batches += outcome.failed_batches;
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: attempted={} succeeded={} skipped={} failed={} failed_batches={}",
            self.entity,
            self.attempted,
            self.succeeded,
            self.skipped,
            self.failed,
            self.failed_batches
        )
    }
}
