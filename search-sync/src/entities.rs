//! Entity types registered by the `search-sync` binary.
//!
//! Each entity is a schema, a mapping table and a batch size. Schema fields
//! without a mapping entry are copied straight from the source record.

use std::collections::BTreeMap;

use search_sync_shared::{
    DescriptorError, DocumentSchema, EntityDescriptor, EntityMapping, EntityRegistry, FieldType,
    MappingError,
};
use serde_json::{json, Value};

use crate::IndexingError;

pub const COMPANY: &str = "company";
pub const CONTACT: &str = "contact";

/// Companies produce large documents, so they are sent in smaller batches.
const COMPANY_BATCH_SIZE: usize = 500;
const CONTACT_BATCH_SIZE: usize = 2000;

pub fn company() -> Result<EntityDescriptor, DescriptorError> {
    let schema = DocumentSchema::new()
        .with_field("name", FieldType::TextWithKeyword)
        .with_field("trading_names", FieldType::Text)
        .with_field("website", FieldType::Keyword)
        .with_field("employee_count", FieldType::Integer)
        .with_field("created_on", FieldType::Date)
        .with_field("sector", FieldType::id_name())
        .with_field("uk_region", FieldType::id_name())
        .with_field("address_country", FieldType::id_name())
        .with_field(
            "one_list_account_owner",
            FieldType::object([
                ("id", FieldType::Keyword),
                ("name", FieldType::TextWithKeyword),
                ("email", FieldType::Keyword),
            ]),
        )
        .with_field("is_active", FieldType::Boolean);

    let mapping = EntityMapping::new()
        .reference("sector")
        .reference("uk_region")
        .reference("address_country")
        .reference_with("one_list_account_owner", &["email"])
        .computed("is_active", |record| {
            Ok(json!(!record.bool("archived").unwrap_or(false)))
        });

    EntityDescriptor::new(COMPANY, schema, mapping)?.with_batch_size(COMPANY_BATCH_SIZE)
}

pub fn contact() -> Result<EntityDescriptor, DescriptorError> {
    let schema = DocumentSchema::new()
        .with_field("name", FieldType::TextWithKeyword)
        .with_field("first_name", FieldType::Text)
        .with_field("last_name", FieldType::Text)
        .with_field("email", FieldType::Keyword)
        .with_field("job_title", FieldType::Text)
        .with_field("created_on", FieldType::Date)
        .with_field(
            "company",
            FieldType::object([
                ("id", FieldType::Keyword),
                ("name", FieldType::TextWithKeyword),
                ("website", FieldType::Keyword),
            ]),
        )
        .with_field("is_active", FieldType::Boolean);

    let mapping = EntityMapping::new()
        .computed("name", contact_name)
        .reference_with("company", &["website"])
        .computed("is_active", |record| {
            Ok(json!(!record.bool("archived").unwrap_or(false)))
        });

    EntityDescriptor::new(CONTACT, schema, mapping)?.with_batch_size(CONTACT_BATCH_SIZE)
}

/// `first_name last_name`, skipping whichever part is missing.
fn contact_name(record: &search_sync_shared::Record) -> Result<Value, MappingError> {
    let parts: Vec<&str> = ["first_name", "last_name"]
        .iter()
        .filter_map(|field| record.value(field))
        .map(|value| {
            value
                .as_str()
                .ok_or_else(|| MappingError::type_mismatch("name", "string"))
        })
        .collect::<Result<_, _>>()?;

    let name = parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        return Err(MappingError::computed("name", "contact has no first or last name"));
    }
    Ok(json!(name))
}

/// Build the registry of demo entity types, applying per-entity batch size overrides.
pub fn default_registry(
    batch_sizes: &BTreeMap<String, usize>,
) -> Result<EntityRegistry, IndexingError> {
    let descriptors = [company(), contact()];

    let mut registry = EntityRegistry::new();
    for descriptor in descriptors {
        let mut descriptor =
            descriptor.map_err(|e| IndexingError::config(format!("Invalid entity: {}", e)))?;
        if let Some(size) = batch_sizes.get(descriptor.name()) {
            descriptor = descriptor
                .with_batch_size(*size)
                .map_err(|e| IndexingError::config(e.to_string()))?;
        }
        registry
            .register(descriptor)
            .map_err(|e| IndexingError::config(e.to_string()))?;
    }

    if let Some(unknown) = batch_sizes
        .keys()
        .find(|name| registry.get(name).is_err())
    {
        return Err(IndexingError::config(format!(
            "Batch size configured for unknown entity '{}'",
            unknown
        )));
    }

    Ok(registry)
}
