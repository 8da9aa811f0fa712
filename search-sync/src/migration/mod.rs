//! Migration coordinator.
//!
//! Drives an entity type from whatever alias state it is found in to steady
//! state on the current schema. Only one coordinator may run per entity type at
//! a time; mutual exclusion is the caller's responsibility.

use std::sync::Arc;

use search_sync_repository::{IndexLifecycleManager, IndexState, MigrationPlan};
use tracing::{info, instrument, warn};

use crate::errors::SyncError;
use crate::orchestrator::{SyncOrchestrator, SyncReport};

/// What a migration run did for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The entity had no index; one was created and fully synced.
    Initialized { index: String, report: SyncReport },
    /// The write index already matches the current schema.
    UpToDate { index: String },
    /// A new index was backfilled and the aliases switched to it.
    Migrated {
        plan: MigrationPlan,
        report: SyncReport,
        /// Whether an interrupted migration was picked up.
        resumed: bool,
    },
}

/// Coordinates setup, backfill and alias switching for entity types.
pub struct MigrationCoordinator {
    lifecycle: Arc<IndexLifecycleManager>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl MigrationCoordinator {
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            lifecycle: orchestrator.lifecycle().clone(),
            orchestrator,
        }
    }

    /// Bring one entity type to steady state on its current schema.
    ///
    /// The aliases are switched only after the backfill wrote every batch; a
    /// backfill with failed batches leaves the migration in progress so a later
    /// run can resume it.
    #[instrument(skip(self))]
    pub async fn migrate(&self, entity: &str) -> Result<MigrationOutcome, SyncError> {
        let descriptor = self.orchestrator.registry().get(entity)?;
        let state = self.lifecycle.inspect(&descriptor).await?;
        info!(entity = %entity, state = %state, "Inspected index state");

        let resumed = match state {
            IndexState::Uninitialized => {
                let setup = self.lifecycle.set_up_index_and_aliases(&descriptor).await?;
                let report = self.orchestrator.sync_all(entity).await?;
                return Ok(MigrationOutcome::Initialized {
                    index: setup.index().to_string(),
                    report,
                });
            }
            IndexState::Steady { index } => {
                return Ok(MigrationOutcome::UpToDate { index });
            }
            IndexState::Stale { .. } => false,
            IndexState::Migrating { .. } => {
                warn!(entity = %entity, "Resuming interrupted migration");
                true
            }
        };

        let plan = self.lifecycle.start_migration(&descriptor).await?;
        let report = self
            .orchestrator
            .backfill(entity, &plan.target_index)
            .await?;
        if !report.is_success() {
            return Err(SyncError::BackfillIncomplete {
                entity: entity.to_string(),
                index: plan.target_index,
                failed_batches: report.failed_batches,
            });
        }

        self.lifecycle.complete_migration(&descriptor, &plan).await?;
        Ok(MigrationOutcome::Migrated {
            plan,
            report,
            resumed,
        })
    }

    /// Migrate every registered entity type, continuing past failures.
    pub async fn migrate_all(&self) -> Vec<(String, Result<MigrationOutcome, SyncError>)> {
        let names: Vec<String> = self
            .orchestrator
            .registry()
            .names()
            .map(str::to_string)
            .collect();

        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let outcome = self.migrate(&name).await;
            outcomes.push((name, outcome));
        }
        outcomes
    }
}
