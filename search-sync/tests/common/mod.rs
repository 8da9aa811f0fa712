//! Shared fixtures for the search sync integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use search_sync::source::{InMemorySource, SourceRetryConfig, SourceStore};
use search_sync::{Dependencies, Settings};
use search_sync_repository::{InMemoryProvider, SearchIndexServiceConfig};
use search_sync_shared::{
    DocumentSchema, EntityDescriptor, EntityMapping, EntityRegistry, FieldType, MappingError,
    Record, RelatedObject,
};
use serde_json::json;

pub const WIDGET: &str = "widget";

fn widget_schema() -> DocumentSchema {
    DocumentSchema::new()
        .with_field("name", FieldType::TextWithKeyword)
        .with_field("price", FieldType::Double)
        .with_field("category", FieldType::id_name())
        .with_field("label", FieldType::Keyword)
}

fn widget_mapping() -> EntityMapping {
    EntityMapping::new()
        .reference("category")
        .computed("label", |record| {
            let name = record
                .value("name")
                .and_then(|value| value.as_str())
                .ok_or_else(|| MappingError::computed("label", "widget has no name"))?;
            Ok(json!(name.to_uppercase()))
        })
}

/// The widget entity type, batched two documents at a time.
pub fn widget_v1() -> EntityDescriptor {
    EntityDescriptor::new(WIDGET, widget_schema(), widget_mapping())
        .and_then(|d| d.with_batch_size(2))
        .unwrap()
}

/// Widget with an extra `color` field, which changes the schema fingerprint.
pub fn widget_v2() -> EntityDescriptor {
    let schema = widget_schema().with_field("color", FieldType::Keyword);
    EntityDescriptor::new(WIDGET, schema, widget_mapping())
        .and_then(|d| d.with_batch_size(2))
        .unwrap()
}

pub fn widget(id: &str, name: &str) -> Record {
    Record::new(id)
        .with("name", json!(name))
        .with("price", json!(9.5))
        .with("color", json!("red"))
        .with("category", RelatedObject::new("cat-1", Some("Tools")))
}

/// Settings that keep retries fast and pages small.
pub fn test_settings() -> Settings {
    Settings {
        page_size: 2,
        service_config: SearchIndexServiceConfig::with_max_batch_size(100).with_retry(3, 1),
        source_retry: SourceRetryConfig::default().with_retry(3, 1),
        ..Settings::default()
    }
}

/// The engine wired over an in-memory cluster and source.
pub struct Harness {
    pub provider: Arc<InMemoryProvider>,
    pub source: Arc<InMemorySource>,
    pub deps: Dependencies,
}

impl Harness {
    pub fn new(descriptor: EntityDescriptor) -> Self {
        Self::over(
            Arc::new(InMemoryProvider::new()),
            Arc::new(InMemorySource::new()),
            descriptor,
        )
    }

    /// Wire a new engine over an existing cluster and source, as a redeploy would.
    pub fn over(
        provider: Arc<InMemoryProvider>,
        source: Arc<InMemorySource>,
        descriptor: EntityDescriptor,
    ) -> Self {
        let deps = engine(provider.clone(), source.clone(), descriptor);
        Self {
            provider,
            source,
            deps,
        }
    }

    pub fn descriptor(&self) -> Arc<EntityDescriptor> {
        self.deps.registry.get(WIDGET).unwrap()
    }

    pub fn index_name(&self) -> String {
        self.deps.lifecycle.index_name(&self.descriptor())
    }

    pub fn read_alias(&self) -> String {
        self.deps.lifecycle.read_alias(&self.descriptor())
    }

    pub fn write_alias(&self) -> String {
        self.deps.lifecycle.write_alias(&self.descriptor())
    }

    pub fn insert(&self, record: Record) {
        self.source.insert(WIDGET, record);
    }
}

/// Wire the engine over any source store with a single registered entity type.
pub fn engine(
    provider: Arc<InMemoryProvider>,
    source: Arc<dyn SourceStore>,
    descriptor: EntityDescriptor,
) -> Dependencies {
    let mut registry = EntityRegistry::new();
    registry.register(descriptor).unwrap();
    Dependencies::from_parts(provider, source, registry, &test_settings()).unwrap()
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
