//! Index and alias lifecycle management.
//!
//! Each entity type is served through two aliases. The write alias always
//! resolves to exactly one physical index; the read alias resolves to one index
//! in steady state and to two (old and new) while a migration is in progress.
//!
//! ```text
//! Uninitialized --setup--> Steady(A)
//! Steady(A) --schema change--> Stale(A -> B)
//! Stale(A -> B) --start_migration--> Migrating(read {A, B}, write A)
//! Migrating --backfill B, complete_migration--> Steady(B)
//! ```
//!
//! The final switch is one atomic alias transaction, so readers never observe
//! a window with no index behind the read alias.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use search_sync_shared::EntityDescriptor;
use tracing::{info, warn};

use crate::errors::SearchIndexError;
use crate::index_config::IndexConfig;
use crate::interfaces::SearchClusterProvider;
use crate::naming::{fingerprint_from_index_name, IndexNaming};
use crate::types::{AliasAction, CreateIndexOutcome};

/// Observed alias topology of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexState {
    /// Neither alias exists.
    Uninitialized,
    /// Both aliases resolve to the index built from the current schema.
    Steady { index: String },
    /// Both aliases resolve to an index built from an older schema.
    Stale { index: String, target_index: String },
    /// The read alias spans more than one index.
    Migrating {
        write_index: String,
        read_indices: BTreeSet<String>,
        target_index: String,
    },
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Steady { index } => write!(f, "steady ({})", index),
            Self::Stale {
                index,
                target_index,
            } => write!(f, "stale ({} -> {})", index, target_index),
            Self::Migrating {
                write_index,
                read_indices,
                target_index,
            } => write!(
                f,
                "migrating (write {}, read [{}], target {})",
                write_index,
                read_indices.iter().cloned().collect::<Vec<_>>().join(", "),
                target_index
            ),
        }
    }
}

/// Result of setting up an entity's index and aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// This call created the index and attached both aliases.
    Created(String),
    /// The write alias was already in place, possibly set up by a concurrent caller.
    AlreadyPresent(String),
}

impl SetupOutcome {
    pub fn index(&self) -> &str {
        match self {
            Self::Created(index) | Self::AlreadyPresent(index) => index,
        }
    }
}

/// The indices involved in one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Index the write alias pointed at when the migration started.
    pub source_index: String,
    /// Index built from the current schema that the backfill populates.
    pub target_index: String,
}

impl MigrationPlan {
    /// Whether the write alias still has to move.
    pub fn swaps_write_alias(&self) -> bool {
        self.source_index != self.target_index
    }
}

/// Where the sync path sends document writes for an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    /// The write alias, resolving to exactly one index.
    pub alias: String,
    /// The current-schema index being backfilled while a migration is in
    /// progress. Writes are mirrored there so the backfill does not miss them.
    pub migration_index: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct AliasSnapshot {
    read_indices: BTreeSet<String>,
    write_indices: BTreeSet<String>,
}

/// Owns the physical-index and alias topology of every entity type.
pub struct IndexLifecycleManager {
    provider: Arc<dyn SearchClusterProvider>,
    naming: IndexNaming,
    index_config: IndexConfig,
}

impl IndexLifecycleManager {
    pub fn new(
        provider: Arc<dyn SearchClusterProvider>,
        naming: IndexNaming,
        index_config: IndexConfig,
    ) -> Self {
        Self {
            provider,
            naming,
            index_config,
        }
    }

    pub fn naming(&self) -> &IndexNaming {
        &self.naming
    }

    /// The physical index name for the descriptor's current schema.
    pub fn index_name(&self, descriptor: &EntityDescriptor) -> String {
        self.naming.current_index_name(descriptor)
    }

    pub fn read_alias(&self, descriptor: &EntityDescriptor) -> String {
        self.naming.read_alias(descriptor.name())
    }

    pub fn write_alias(&self, descriptor: &EntityDescriptor) -> String {
        self.naming.write_alias(descriptor.name())
    }

    async fn snapshot(
        &self,
        descriptor: &EntityDescriptor,
    ) -> Result<AliasSnapshot, SearchIndexError> {
        let read_indices = self
            .provider
            .get_indices_for_alias(&self.read_alias(descriptor))
            .await?;
        let write_indices = self
            .provider
            .get_indices_for_alias(&self.write_alias(descriptor))
            .await?;
        Ok(AliasSnapshot {
            read_indices,
            write_indices,
        })
    }

    /// The single index behind the write alias, `None` when the alias does not exist.
    ///
    /// A write alias resolving to more than one index is a fatal configuration fault.
    fn single_write_index(
        &self,
        descriptor: &EntityDescriptor,
        snapshot: &AliasSnapshot,
    ) -> Result<Option<String>, SearchIndexError> {
        let mut indices = snapshot.write_indices.iter();
        match (indices.next(), indices.next()) {
            (None, _) => Ok(None),
            (Some(index), None) => Ok(Some(index.clone())),
            (Some(_), Some(_)) => Err(SearchIndexError::alias_configuration(format!(
                "Write alias {} resolves to {} indices: {:?}",
                self.write_alias(descriptor),
                snapshot.write_indices.len(),
                snapshot.write_indices
            ))),
        }
    }

    /// An existing read alias must include the write index, or readers would
    /// never see what the sync path writes.
    fn check_read_covers_write(
        &self,
        descriptor: &EntityDescriptor,
        snapshot: &AliasSnapshot,
        write_index: &str,
    ) -> Result<(), SearchIndexError> {
        if snapshot.read_indices.is_empty() || snapshot.read_indices.contains(write_index) {
            return Ok(());
        }
        Err(SearchIndexError::alias_configuration(format!(
            "Read alias {} resolves to {:?}, which does not include write index {}",
            self.read_alias(descriptor),
            snapshot.read_indices,
            write_index
        )))
    }

    /// The physical index behind the write alias, `None` when the entity is uninitialized.
    pub async fn write_index(
        &self,
        descriptor: &EntityDescriptor,
    ) -> Result<Option<String>, SearchIndexError> {
        let snapshot = self.snapshot(descriptor).await?;
        self.single_write_index(descriptor, &snapshot)
    }

    /// Classify the entity's current alias topology.
    ///
    /// A read alias that does not include the write index is an alias
    /// configuration error.
    pub async fn inspect(
        &self,
        descriptor: &EntityDescriptor,
    ) -> Result<IndexState, SearchIndexError> {
        let snapshot = self.snapshot(descriptor).await?;
        let target_index = self.index_name(descriptor);

        let Some(write_index) = self.single_write_index(descriptor, &snapshot)? else {
            if snapshot.read_indices.is_empty() {
                return Ok(IndexState::Uninitialized);
            }
            return Err(SearchIndexError::alias_configuration(format!(
                "Read alias {} exists but write alias {} does not",
                self.read_alias(descriptor),
                self.write_alias(descriptor)
            )));
        };
        self.check_read_covers_write(descriptor, &snapshot, &write_index)?;

        if snapshot.read_indices.len() > 1 {
            return Ok(IndexState::Migrating {
                write_index,
                read_indices: snapshot.read_indices,
                target_index,
            });
        }

        if write_index == target_index {
            Ok(IndexState::Steady { index: write_index })
        } else {
            Ok(IndexState::Stale {
                index: write_index,
                target_index,
            })
        }
    }

    /// Create an index for the descriptor's current schema. Losing a creation race is fine.
    async fn create_index(
        &self,
        descriptor: &EntityDescriptor,
        index: &str,
    ) -> Result<CreateIndexOutcome, SearchIndexError> {
        let body = self.index_config.index_body(descriptor.schema());
        self.provider.create_index(index, &body).await
    }

    /// Bring an uninitialized entity to steady state: create the current-schema
    /// index and point both aliases at it.
    ///
    /// Safe to call concurrently and repeatedly. An entity that already has a
    /// write alias is left untouched apart from restoring a missing read alias.
    pub async fn set_up_index_and_aliases(
        &self,
        descriptor: &EntityDescriptor,
    ) -> Result<SetupOutcome, SearchIndexError> {
        let snapshot = self.snapshot(descriptor).await?;
        if let Some(existing) = self.single_write_index(descriptor, &snapshot)? {
            self.check_read_covers_write(descriptor, &snapshot, &existing)?;
            self.repair_read_alias(descriptor, &snapshot, &existing)
                .await?;
            return Ok(SetupOutcome::AlreadyPresent(existing));
        }
        if !snapshot.read_indices.is_empty() {
            return Err(SearchIndexError::alias_configuration(format!(
                "Read alias {} exists but write alias {} does not",
                self.read_alias(descriptor),
                self.write_alias(descriptor)
            )));
        }

        let index = self.index_name(descriptor);
        let outcome = self.create_index(descriptor, &index).await?;

        // Another caller may have finished setup while the index was being created.
        if let Some(existing) = self.write_index(descriptor).await? {
            return Ok(SetupOutcome::AlreadyPresent(existing));
        }

        self.provider
            .update_aliases(&[
                AliasAction::add(&index, self.read_alias(descriptor)),
                AliasAction::add(&index, self.write_alias(descriptor)),
            ])
            .await?;

        // Concurrent setups with the same schema converge on the same index;
        // different schemas racing here leave the write alias ambiguous.
        match self.write_index(descriptor).await? {
            Some(resolved) if resolved == index => {}
            Some(resolved) => {
                return Err(SearchIndexError::alias_configuration(format!(
                    "Write alias {} resolved to {} after setting up {}",
                    self.write_alias(descriptor),
                    resolved,
                    index
                )))
            }
            None => {
                return Err(SearchIndexError::alias_configuration(format!(
                    "Write alias {} missing after setup",
                    self.write_alias(descriptor)
                )))
            }
        }

        info!(
            entity = %descriptor.name(),
            index = %index,
            fingerprint = %descriptor.fingerprint(),
            "Set up index and aliases"
        );
        Ok(match outcome {
            CreateIndexOutcome::Created => SetupOutcome::Created(index),
            CreateIndexOutcome::AlreadyExists => SetupOutcome::AlreadyPresent(index),
        })
    }

    /// Re-attach a missing read alias to the write index.
    async fn repair_read_alias(
        &self,
        descriptor: &EntityDescriptor,
        snapshot: &AliasSnapshot,
        write_index: &str,
    ) -> Result<(), SearchIndexError> {
        if !snapshot.read_indices.is_empty() {
            return Ok(());
        }
        let read_alias = self.read_alias(descriptor);
        warn!(
            entity = %descriptor.name(),
            alias = %read_alias,
            index = %write_index,
            "Read alias missing, re-attaching it to the write index"
        );
        self.provider
            .update_aliases(&[AliasAction::add(write_index, read_alias)])
            .await
    }

    /// Resolve where document writes go, setting the entity up on first use.
    ///
    /// Fails with an alias configuration error when the write alias is
    /// ambiguous or the read alias does not include the write index.
    pub async fn ensure_write_target(
        &self,
        descriptor: &EntityDescriptor,
    ) -> Result<WriteTarget, SearchIndexError> {
        let mut snapshot = self.snapshot(descriptor).await?;
        let write_index = match self.single_write_index(descriptor, &snapshot)? {
            Some(index) => index,
            None => {
                self.set_up_index_and_aliases(descriptor).await?;
                snapshot = self.snapshot(descriptor).await?;
                self.single_write_index(descriptor, &snapshot)?
                    .ok_or_else(|| {
                        SearchIndexError::alias_configuration(format!(
                            "Write alias {} missing after setup",
                            self.write_alias(descriptor)
                        ))
                    })?
            }
        };

        self.check_read_covers_write(descriptor, &snapshot, &write_index)?;
        self.repair_read_alias(descriptor, &snapshot, &write_index)
            .await?;

        let target_index = self.index_name(descriptor);
        let migration_index = (write_index != target_index
            && snapshot.read_indices.contains(&target_index))
        .then_some(target_index);

        Ok(WriteTarget {
            alias: self.write_alias(descriptor),
            migration_index,
        })
    }

    /// Whether the index behind the write alias was built from a different schema.
    ///
    /// Only meaningful for initialized entities; an absent write alias is an error.
    pub async fn is_migration_needed(
        &self,
        descriptor: &EntityDescriptor,
    ) -> Result<bool, SearchIndexError> {
        let write_index = self.write_index(descriptor).await?.ok_or_else(|| {
            SearchIndexError::alias_configuration(format!(
                "Write alias {} does not exist",
                self.write_alias(descriptor)
            ))
        })?;

        let needed = fingerprint_from_index_name(&write_index)
            .map_or(true, |fingerprint| &fingerprint != descriptor.fingerprint());
        Ok(needed)
    }

    /// Whether a migration was started and not completed: the read alias spans
    /// several indices.
    pub async fn was_migration_started(
        &self,
        descriptor: &EntityDescriptor,
    ) -> Result<bool, SearchIndexError> {
        let read_indices = self
            .provider
            .get_indices_for_alias(&self.read_alias(descriptor))
            .await?;
        Ok(read_indices.len() > 1)
    }

    /// Create the current-schema index and add it to the read alias.
    ///
    /// Idempotent: resuming an interrupted migration returns the same plan.
    /// When the write index already matches the current schema the plan's
    /// source and target are equal and nothing is created.
    pub async fn start_migration(
        &self,
        descriptor: &EntityDescriptor,
    ) -> Result<MigrationPlan, SearchIndexError> {
        let snapshot = self.snapshot(descriptor).await?;
        let source_index = self
            .single_write_index(descriptor, &snapshot)?
            .ok_or_else(|| {
                SearchIndexError::alias_configuration(format!(
                    "Cannot migrate {}: write alias {} does not exist",
                    descriptor.name(),
                    self.write_alias(descriptor)
                ))
            })?;

        self.check_read_covers_write(descriptor, &snapshot, &source_index)?;

        let target_index = self.index_name(descriptor);
        let plan = MigrationPlan {
            source_index,
            target_index,
        };
        if !plan.swaps_write_alias() {
            return Ok(plan);
        }

        self.create_index(descriptor, &plan.target_index).await?;

        let mut actions = Vec::new();
        if snapshot.read_indices.is_empty() {
            actions.push(AliasAction::add(
                &plan.source_index,
                self.read_alias(descriptor),
            ));
        }
        if !snapshot.read_indices.contains(&plan.target_index) {
            actions.push(AliasAction::add(
                &plan.target_index,
                self.read_alias(descriptor),
            ));
        }
        if !actions.is_empty() {
            self.provider.update_aliases(&actions).await?;
        }

        info!(
            entity = %descriptor.name(),
            source = %plan.source_index,
            target = %plan.target_index,
            "Migration started"
        );
        Ok(plan)
    }

    /// Switch both aliases to the plan's target in one atomic transaction.
    ///
    /// The write alias moves from source to target and every other index is
    /// removed from the read alias. The caller must have finished the backfill.
    /// Old indices are left in the cluster. A plan whose target is not the
    /// descriptor's current-schema index is rejected without touching aliases.
    pub async fn complete_migration(
        &self,
        descriptor: &EntityDescriptor,
        plan: &MigrationPlan,
    ) -> Result<(), SearchIndexError> {
        let current_index = self.index_name(descriptor);
        if plan.target_index != current_index {
            return Err(SearchIndexError::alias_configuration(format!(
                "Migration target {} is not the current index {} of {}",
                plan.target_index,
                current_index,
                descriptor.name()
            )));
        }

        let snapshot = self.snapshot(descriptor).await?;
        let write_index = self
            .single_write_index(descriptor, &snapshot)?
            .ok_or_else(|| {
                SearchIndexError::alias_configuration(format!(
                    "Cannot complete migration of {}: write alias {} does not exist",
                    descriptor.name(),
                    self.write_alias(descriptor)
                ))
            })?;

        if !snapshot.read_indices.contains(&plan.target_index) {
            return Err(SearchIndexError::alias_configuration(format!(
                "Migration target {} is not behind read alias {}",
                plan.target_index,
                self.read_alias(descriptor)
            )));
        }

        let read_alias = self.read_alias(descriptor);
        let write_alias = self.write_alias(descriptor);
        let mut actions = Vec::new();
        if write_index == plan.target_index {
            // Already switched by an earlier attempt.
        } else if write_index == plan.source_index {
            actions.push(AliasAction::add(&plan.target_index, &write_alias));
            actions.push(AliasAction::remove(&plan.source_index, &write_alias));
        } else {
            return Err(SearchIndexError::alias_configuration(format!(
                "Write alias {} moved to {} during migration from {} to {}",
                write_alias, write_index, plan.source_index, plan.target_index
            )));
        }
        actions.extend(
            snapshot
                .read_indices
                .iter()
                .filter(|index| **index != plan.target_index)
                .map(|index| AliasAction::remove(index, &read_alias)),
        );

        if !actions.is_empty() {
            self.provider.update_aliases(&actions).await?;
        }

        info!(
            entity = %descriptor.name(),
            source = %plan.source_index,
            target = %plan.target_index,
            "Migration completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryProvider;
    use search_sync_shared::{DocumentSchema, EntityMapping, FieldType};

    fn widget(extra_field: bool) -> EntityDescriptor {
        let mut schema = DocumentSchema::new().with_field("name", FieldType::TextWithKeyword);
        if extra_field {
            schema = schema.with_field("color", FieldType::Keyword);
        }
        EntityDescriptor::new("widget", schema, EntityMapping::new()).unwrap()
    }

    fn manager(provider: Arc<InMemoryProvider>) -> IndexLifecycleManager {
        IndexLifecycleManager::new(
            provider,
            IndexNaming::new("test").unwrap(),
            IndexConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_setup_from_cold_start() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        let descriptor = widget(false);

        assert_eq!(
            manager.inspect(&descriptor).await.unwrap(),
            IndexState::Uninitialized
        );

        let outcome = manager.set_up_index_and_aliases(&descriptor).await.unwrap();
        let index = manager.index_name(&descriptor);
        assert_eq!(outcome, SetupOutcome::Created(index.clone()));
        assert_eq!(
            provider.alias_targets("test-widget-read"),
            BTreeSet::from([index.clone()])
        );
        assert_eq!(
            provider.alias_targets("test-widget-write"),
            BTreeSet::from([index.clone()])
        );
        assert_eq!(
            manager.inspect(&descriptor).await.unwrap(),
            IndexState::Steady { index }
        );
        assert!(!manager.is_migration_needed(&descriptor).await.unwrap());
    }

    #[tokio::test]
    async fn test_setup_is_idempotent() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        let descriptor = widget(false);

        manager.set_up_index_and_aliases(&descriptor).await.unwrap();
        let second = manager.set_up_index_and_aliases(&descriptor).await.unwrap();

        assert!(matches!(second, SetupOutcome::AlreadyPresent(_)));
        assert_eq!(provider.indices().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_setup_converges() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = Arc::new(manager(provider.clone()));
        let descriptor = Arc::new(widget(false));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = manager.clone();
                let descriptor = descriptor.clone();
                tokio::spawn(async move { manager.set_up_index_and_aliases(&descriptor).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(provider.indices().len(), 1);
        assert_eq!(provider.alias_targets("test-widget-write").len(), 1);
        assert_eq!(provider.alias_targets("test-widget-read").len(), 1);
    }

    #[tokio::test]
    async fn test_missing_read_alias_is_repaired() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        let descriptor = widget(false);
        manager.set_up_index_and_aliases(&descriptor).await.unwrap();

        let index = manager.index_name(&descriptor);
        provider
            .update_aliases(&[AliasAction::remove(&index, "test-widget-read")])
            .await
            .unwrap();

        let target = manager.ensure_write_target(&descriptor).await.unwrap();
        assert_eq!(target.alias, "test-widget-write");
        assert_eq!(target.migration_index, None);
        assert_eq!(
            provider.alias_targets("test-widget-read"),
            BTreeSet::from([index])
        );
    }

    #[tokio::test]
    async fn test_ensure_write_target_sets_up_cold_entity() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        let descriptor = widget(false);

        let target = manager.ensure_write_target(&descriptor).await.unwrap();

        assert_eq!(target.alias, "test-widget-write");
        assert_eq!(provider.indices(), vec![manager.index_name(&descriptor)]);
    }

    #[tokio::test]
    async fn test_schema_change_detected() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        let old = widget(false);
        let new = widget(true);
        manager.set_up_index_and_aliases(&old).await.unwrap();

        assert!(manager.is_migration_needed(&new).await.unwrap());
        assert!(!manager.was_migration_started(&new).await.unwrap());
        assert_eq!(
            manager.inspect(&new).await.unwrap(),
            IndexState::Stale {
                index: manager.index_name(&old),
                target_index: manager.index_name(&new),
            }
        );
    }

    #[tokio::test]
    async fn test_migration_swaps_aliases_atomically() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        let old = widget(false);
        let new = widget(true);
        manager.set_up_index_and_aliases(&old).await.unwrap();
        let old_index = manager.index_name(&old);
        let new_index = manager.index_name(&new);

        let plan = manager.start_migration(&new).await.unwrap();
        assert_eq!(plan.source_index, old_index);
        assert_eq!(plan.target_index, new_index);
        assert!(manager.was_migration_started(&new).await.unwrap());
        assert_eq!(
            provider.alias_targets("test-widget-read"),
            BTreeSet::from([old_index.clone(), new_index.clone()])
        );
        assert_eq!(
            manager.write_index(&new).await.unwrap(),
            Some(old_index.clone())
        );

        let target = manager.ensure_write_target(&new).await.unwrap();
        assert_eq!(target.migration_index, Some(new_index.clone()));

        let calls_before = provider.alias_update_calls();
        manager.complete_migration(&new, &plan).await.unwrap();
        assert_eq!(provider.alias_update_calls(), calls_before + 1);

        assert_eq!(
            provider.alias_targets("test-widget-read"),
            BTreeSet::from([new_index.clone()])
        );
        assert_eq!(
            provider.alias_targets("test-widget-write"),
            BTreeSet::from([new_index.clone()])
        );
        // Old index is kept.
        assert!(provider.index_exists(&old_index).await.unwrap());
        assert_eq!(
            manager.inspect(&new).await.unwrap(),
            IndexState::Steady { index: new_index }
        );
    }

    #[tokio::test]
    async fn test_start_migration_is_resumable() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        manager.set_up_index_and_aliases(&widget(false)).await.unwrap();
        let new = widget(true);

        let first = manager.start_migration(&new).await.unwrap();
        let second = manager.start_migration(&new).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.alias_targets("test-widget-read").len(), 2);
        assert!(matches!(
            manager.inspect(&new).await.unwrap(),
            IndexState::Migrating { .. }
        ));
    }

    #[tokio::test]
    async fn test_complete_migration_twice_is_harmless() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        manager.set_up_index_and_aliases(&widget(false)).await.unwrap();
        let new = widget(true);

        let plan = manager.start_migration(&new).await.unwrap();
        manager.complete_migration(&new, &plan).await.unwrap();
        manager.complete_migration(&new, &plan).await.unwrap();

        assert_eq!(
            provider.alias_targets("test-widget-write"),
            BTreeSet::from([plan.target_index])
        );
    }

    #[tokio::test]
    async fn test_write_alias_with_two_indices_is_fatal() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        let descriptor = widget(false);
        manager.set_up_index_and_aliases(&descriptor).await.unwrap();

        provider
            .create_index("test-widget-stray", &serde_json::json!({}))
            .await
            .unwrap();
        provider
            .update_aliases(&[AliasAction::add("test-widget-stray", "test-widget-write")])
            .await
            .unwrap();

        assert!(manager.inspect(&descriptor).await.unwrap_err().is_fatal());
        assert!(manager
            .ensure_write_target(&descriptor)
            .await
            .unwrap_err()
            .is_fatal());
        assert!(manager
            .start_migration(&widget(true))
            .await
            .unwrap_err()
            .is_fatal());
    }

    #[tokio::test]
    async fn test_write_index_outside_read_alias_is_fatal() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        let descriptor = widget(false);
        manager.set_up_index_and_aliases(&descriptor).await.unwrap();
        let index = manager.index_name(&descriptor);

        provider
            .create_index("test-widget-other", &serde_json::json!({}))
            .await
            .unwrap();
        provider
            .update_aliases(&[
                AliasAction::add("test-widget-other", "test-widget-read"),
                AliasAction::remove(&index, "test-widget-read"),
            ])
            .await
            .unwrap();

        let err = manager.inspect(&descriptor).await.unwrap_err();
        assert!(matches!(err, SearchIndexError::AliasConfiguration(_)));
        assert!(manager
            .ensure_write_target(&descriptor)
            .await
            .unwrap_err()
            .is_fatal());
        assert!(manager
            .set_up_index_and_aliases(&descriptor)
            .await
            .unwrap_err()
            .is_fatal());
        let err = manager.start_migration(&widget(true)).await.unwrap_err();
        assert!(err.is_fatal());
        // Nothing was re-pointed.
        assert_eq!(
            provider.alias_targets("test-widget-read"),
            BTreeSet::from(["test-widget-other".to_string()])
        );
    }

    #[tokio::test]
    async fn test_complete_migration_rejects_foreign_target() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        let old = widget(false);
        let new = widget(true);
        manager.set_up_index_and_aliases(&old).await.unwrap();
        let plan = manager.start_migration(&new).await.unwrap();

        provider
            .create_index("test-widget-other", &serde_json::json!({}))
            .await
            .unwrap();
        provider
            .update_aliases(&[AliasAction::add("test-widget-other", "test-widget-read")])
            .await
            .unwrap();
        let calls_before = provider.alias_update_calls();
        let foreign = MigrationPlan {
            source_index: plan.source_index.clone(),
            target_index: "test-widget-other".to_string(),
        };

        let err = manager.complete_migration(&new, &foreign).await.unwrap_err();
        assert!(matches!(err, SearchIndexError::AliasConfiguration(_)));

        // A plan built for an older descriptor is rejected the same way.
        let err = manager.complete_migration(&old, &plan).await.unwrap_err();
        assert!(err.is_fatal());

        assert_eq!(provider.alias_update_calls(), calls_before);
        assert_eq!(
            provider.alias_targets("test-widget-write"),
            BTreeSet::from([plan.source_index])
        );
    }

    #[tokio::test]
    async fn test_is_migration_needed_requires_initialized_entity() {
        let manager = manager(Arc::new(InMemoryProvider::new()));
        let err = manager.is_migration_needed(&widget(false)).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_index_body_carries_schema_mapping() {
        let provider = Arc::new(InMemoryProvider::new());
        let manager = manager(provider.clone());
        let descriptor = widget(true);
        manager.set_up_index_and_aliases(&descriptor).await.unwrap();

        let body = provider
            .index_body(&manager.index_name(&descriptor))
            .unwrap();
        assert_eq!(body["mappings"]["properties"]["color"]["type"], "keyword");
        assert_eq!(
            body["mappings"]["properties"]["_document_type"]["type"],
            "keyword"
        );
    }
}
