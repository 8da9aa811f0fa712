//! Entity declarations.
//!
//! An [`EntityDescriptor`] bundles everything the engine needs to know about
//! one searchable entity type: its registered name, its document schema and
//! the mapping table for the fields that need a transform. It is built once
//! at process start and passed around by reference.

use std::fmt;

use crate::errors::{DescriptorError, MappingError};
use crate::fingerprint::{fingerprint, SchemaFingerprint};
use crate::mapping::field::FieldTransform;
use crate::types::{DocumentSchema, FieldType, Record};

/// Reserved document field recording which entity type produced a document.
pub const DISCRIMINATOR_FIELD: &str = "_document_type";

/// Default number of documents per bulk call.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Field name to transform table of one entity type.
///
/// Fields are evaluated in declaration order; declaring a field twice keeps
/// the last transform in the original position.
#[derive(Debug, Clone, Default)]
pub struct EntityMapping {
    fields: Vec<(String, FieldTransform)>,
}

impl EntityMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field with an explicit transform.
    pub fn with(mut self, field: impl Into<String>, transform: FieldTransform) -> Self {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = transform,
            None => self.fields.push((field, transform)),
        }
        self
    }

    /// Declare a direct-copy field.
    pub fn direct(self, field: impl Into<String>) -> Self {
        self.with(field, FieldTransform::DirectCopy)
    }

    /// Declare a `{id, name}` reference field.
    pub fn reference(self, field: impl Into<String>) -> Self {
        self.with(field, FieldTransform::reference())
    }

    /// Declare a reference field with extra fields from the related record.
    pub fn reference_with(self, field: impl Into<String>, extra_fields: &[&str]) -> Self {
        self.with(field, FieldTransform::reference_with(extra_fields))
    }

    /// Declare a field computed from the whole record.
    pub fn computed<F>(self, field: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Record) -> Result<serde_json::Value, MappingError> + Send + Sync + 'static,
    {
        self.with(field, FieldTransform::computed(compute))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldTransform)> {
        self.fields
            .iter()
            .map(|(name, transform)| (name.as_str(), transform))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A searchable entity type: name, schema and mapping table.
#[derive(Clone)]
pub struct EntityDescriptor {
    name: String,
    schema: DocumentSchema,
    mapping: EntityMapping,
    pass_through: Vec<String>,
    fingerprint: SchemaFingerprint,
    batch_size: usize,
}

impl EntityDescriptor {
    /// Build a descriptor, validating the mapping against the schema.
    ///
    /// The discriminator field is added to the schema as a keyword. Every
    /// schema field that has no mapping entry becomes a pass-through field.
    pub fn new(
        name: impl Into<String>,
        schema: DocumentSchema,
        mapping: EntityMapping,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid_name {
            return Err(DescriptorError::InvalidName(name));
        }

        for (field, _) in mapping.iter() {
            if field == DISCRIMINATOR_FIELD {
                return Err(DescriptorError::ReservedField {
                    entity: name,
                    field: field.to_string(),
                });
            }
            if !schema.contains(field) {
                return Err(DescriptorError::UndeclaredField {
                    entity: name,
                    field: field.to_string(),
                });
            }
        }

        let mut schema = schema;
        schema.insert(DISCRIMINATOR_FIELD, FieldType::Keyword);

        let pass_through = schema
            .field_names()
            .filter(|field| *field != DISCRIMINATOR_FIELD && !mapping.contains(field))
            .map(str::to_string)
            .collect();
        let fingerprint = fingerprint(&schema);

        Ok(Self {
            name,
            schema,
            mapping,
            pass_through,
            fingerprint,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Set the number of documents sent per bulk call for this entity type.
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, DescriptorError> {
        if batch_size == 0 {
            return Err(DescriptorError::ZeroBatchSize { entity: self.name });
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    pub fn mapping(&self) -> &EntityMapping {
        &self.mapping
    }

    /// Schema fields copied by name from the record, in sorted order.
    pub fn pass_through_fields(&self) -> &[String] {
        &self.pass_through
    }

    /// Fingerprint of the schema declared in code.
    pub fn fingerprint(&self) -> &SchemaFingerprint {
        &self.fingerprint
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("name", &self.name)
            .field("fingerprint", &self.fingerprint)
            .field("mapping", &self.mapping)
            .field("pass_through", &self.pass_through)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
