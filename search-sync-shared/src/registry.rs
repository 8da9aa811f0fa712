//! Registry of searchable entity types.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::RegistryError;
use crate::mapping::EntityDescriptor;

/// All entity types the engine knows about, keyed by name.
///
/// Built once at process start and shared by reference with the lifecycle
/// manager and the sync orchestrator.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: BTreeMap<String, Arc<EntityDescriptor>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type. Names must be unique.
    pub fn register(&mut self, descriptor: EntityDescriptor) -> Result<(), RegistryError> {
        let name = descriptor.name().to_string();
        if self.entities.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.entities.insert(name, Arc::new(descriptor));
        Ok(())
    }

    /// Look up an entity type by name.
    pub fn get(&self, name: &str) -> Result<Arc<EntityDescriptor>, RegistryError> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownEntity(name.to_string()))
    }

    /// Registered entity names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
