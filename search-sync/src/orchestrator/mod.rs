//! Orchestrator module for the search sync engine.
//!
//! Coordinates the source store, processor and loader for one entity type at
//! a time: targeted syncs by id, full-table syncs, re-syncs of the records
//! referencing a changed related record, deletions and migration backfills.
//! Source calls are retried through [`RetryingSource`].

mod report;

pub use report::SyncReport;

use std::collections::HashSet;
use std::pin::pin;
use std::sync::Arc;

use futures::TryStreamExt;
use search_sync_repository::{IndexLifecycleManager, WriteTarget};
use search_sync_shared::{Document, EntityDescriptor, EntityRegistry};
use tracing::{info, instrument, warn};

use crate::errors::SyncError;
use crate::loader::SearchLoader;
use crate::processor::DocumentProcessor;
use crate::source::{stream_pages, RetryingSource, SourceRetryConfig, SourceStore};

/// Default number of records per source page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Records fetched per source page during full-table runs.
    pub page_size: usize,
    /// Timeout and retry policy of every source call.
    pub source_retry: SourceRetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            source_retry: SourceRetryConfig::default(),
        }
    }
}

/// Orchestrator that pushes mapped documents into the search cluster.
///
/// Document writes go through the entity's write alias. While a migration is in
/// progress they are mirrored into the migration target index as well.
pub struct SyncOrchestrator {
    registry: Arc<EntityRegistry>,
    source: Arc<dyn SourceStore>,
    lifecycle: Arc<IndexLifecycleManager>,
    processor: DocumentProcessor,
    loader: SearchLoader,
    config: OrchestratorConfig,
}

impl SyncOrchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(
        registry: Arc<EntityRegistry>,
        source: Arc<dyn SourceStore>,
        lifecycle: Arc<IndexLifecycleManager>,
        loader: SearchLoader,
    ) -> Self {
        Self::with_config(registry, source, lifecycle, loader, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    ///
    /// `source` is wrapped so that transient source faults are retried.
    pub fn with_config(
        registry: Arc<EntityRegistry>,
        source: Arc<dyn SourceStore>,
        lifecycle: Arc<IndexLifecycleManager>,
        loader: SearchLoader,
        config: OrchestratorConfig,
    ) -> Self {
        let source: Arc<dyn SourceStore> =
            Arc::new(RetryingSource::new(source, config.source_retry.clone()));
        Self {
            registry,
            source,
            lifecycle,
            processor: DocumentProcessor::new(),
            loader,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    pub fn lifecycle(&self) -> &Arc<IndexLifecycleManager> {
        &self.lifecycle
    }

    /// Sync the given record ids of one entity type.
    ///
    /// Ids with no source record are skipped with a warning. Records whose mapping
    /// fails are counted as failed and skipped; the rest of the batch proceeds.
    #[instrument(skip(self, ids), fields(id_count = ids.len()))]
    pub async fn sync(&self, entity: &str, ids: &[String]) -> Result<SyncReport, SyncError> {
        let descriptor = self.registry.get(entity)?;
        let target = self.lifecycle.ensure_write_target(&descriptor).await?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut report = SyncReport::new(entity);
        report.attempted = ids.len();

        for chunk in ids.chunks(descriptor.batch_size()) {
            let records = self.source.fetch_by_ids(entity, chunk).await?;
            let found: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
            for id in chunk.iter().filter(|id| !found.contains(id.as_str())) {
                warn!(entity = %entity, record_id = %id, "Source record missing, skipping");
                report.skipped += 1;
            }

            let batch = self.processor.process_batch(&descriptor, &records);
            report.failed += batch.failures.len();
            self.write(&descriptor, &target, &batch.documents, &mut report)
                .await?;
        }

        info!(report = %report, "Sync completed");
        Ok(report)
    }

    /// Re-sync the `entity` records whose `field` relation points at `related_id`.
    ///
    /// Run after a related record changes, so documents embedding its fields
    /// pick up the new values. No referencing records is an empty report.
    #[instrument(skip(self))]
    pub async fn sync_related(
        &self,
        entity: &str,
        field: &str,
        related_id: &str,
    ) -> Result<SyncReport, SyncError> {
        self.registry.get(entity)?;
        let ids = self
            .source
            .fetch_referencing_ids(entity, field, related_id)
            .await?;
        if ids.is_empty() {
            info!("No records reference the related record");
            return Ok(SyncReport::new(entity));
        }
        self.sync(entity, &ids).await
    }

    /// Re-index every record of one entity type through the write alias.
    #[instrument(skip(self))]
    pub async fn sync_all(&self, entity: &str) -> Result<SyncReport, SyncError> {
        let descriptor = self.registry.get(entity)?;
        let target = self.lifecycle.ensure_write_target(&descriptor).await?;

        let report = self.sync_pages(&descriptor, &target).await?;
        info!(report = %report, "Full sync completed");
        Ok(report)
    }

    /// Copy every record of one entity type into an explicit physical index.
    ///
    /// Used by migrations to populate the new index before the aliases switch.
    #[instrument(skip(self))]
    pub async fn backfill(
        &self,
        entity: &str,
        target_index: &str,
    ) -> Result<SyncReport, SyncError> {
        let descriptor = self.registry.get(entity)?;
        let target = WriteTarget {
            alias: target_index.to_string(),
            migration_index: None,
        };

        let report = self.sync_pages(&descriptor, &target).await?;
        info!(report = %report, "Backfill completed");
        Ok(report)
    }

    /// Remove documents by id. Ids that were never indexed are not an error.
    #[instrument(skip(self, ids), fields(id_count = ids.len()))]
    pub async fn delete(&self, entity: &str, ids: &[String]) -> Result<SyncReport, SyncError> {
        let descriptor = self.registry.get(entity)?;
        let target = self.lifecycle.ensure_write_target(&descriptor).await?;

        let mut report = SyncReport::new(entity);
        report.attempted = ids.len();

        let outcome = self
            .loader
            .delete(&target.alias, ids, descriptor.batch_size())
            .await?;
        report.record_load(outcome);

        if let Some(index) = &target.migration_index {
            let mirrored = self
                .loader
                .delete(index, ids, descriptor.batch_size())
                .await?;
            report.failed_batches += mirrored.failed_batches;
        }

        info!(report = %report, "Delete completed");
        Ok(report)
    }

    async fn sync_pages(
        &self,
        descriptor: &EntityDescriptor,
        target: &WriteTarget,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(descriptor.name());
        let mut pages = pin!(stream_pages(
            self.source.as_ref(),
            descriptor.name(),
            self.config.page_size
        ));

        while let Some(records) = pages.try_next().await? {
            report.attempted += records.len();
            let batch = self.processor.process_batch(descriptor, &records);
            report.failed += batch.failures.len();
            self.write(descriptor, target, &batch.documents, &mut report)
                .await?;
        }

        Ok(report)
    }

    /// Upsert documents into the write target and mirror them into the
    /// migration index, if any.
    async fn write(
        &self,
        descriptor: &EntityDescriptor,
        target: &WriteTarget,
        documents: &[Document],
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let outcome = self
            .loader
            .upsert(&target.alias, documents, descriptor.batch_size())
            .await?;
        report.record_load(outcome);

        if let Some(index) = &target.migration_index {
            let mirrored = self
                .loader
                .upsert(index, documents, descriptor.batch_size())
                .await?;
            if mirrored.failed_batches > 0 {
                warn!(
                    entity = %descriptor.name(),
                    index = %index,
                    failed_batches = mirrored.failed_batches,
                    "Failed to mirror batch into migration target"
                );
            }
            report.failed_batches += mirrored.failed_batches;
        }
        Ok(())
    }
}
