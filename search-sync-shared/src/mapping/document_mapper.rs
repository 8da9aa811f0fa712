//! Record to document mapping.

use serde_json::Value;

use crate::errors::MappingError;
use crate::mapping::descriptor::{EntityDescriptor, DISCRIMINATOR_FIELD};
use crate::types::{Document, Record};

/// Stateless mapper from source records to search documents.
///
/// Mapping is a pure function of the record and the descriptor: the same
/// inputs always give a byte-identical document. Fields whose value is null
/// are left out of the document entirely.
pub struct DocumentMapper;

impl DocumentMapper {
    /// Map one record.
    ///
    /// 1. Every mapped field is produced by its transform.
    /// 2. Every pass-through field is copied from the identically-named attribute.
    /// 3. The discriminator is set to the entity name.
    ///
    /// A failing transform aborts the mapping of this record only.
    pub fn map(descriptor: &EntityDescriptor, record: &Record) -> Result<Document, MappingError> {
        let mut document = Document::new(record.id.clone());

        for (field, transform) in descriptor.mapping().iter() {
            let value = transform.apply(field, record)?;
            if !value.is_null() {
                document.insert(field, value);
            }
        }

        for field in descriptor.pass_through_fields() {
            if let Some(attribute) = record.attribute(field) {
                let value = attribute.to_value();
                if !value.is_null() {
                    document.insert(field.clone(), value);
                }
            }
        }

        document.insert(
            DISCRIMINATOR_FIELD,
            Value::String(descriptor.name().to_string()),
        );

        Ok(document)
    }
}
