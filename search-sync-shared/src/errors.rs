//! Error types for mapping declarations and record mapping.

use thiserror::Error;

/// A single record could not be mapped to a document.
///
/// Mapping errors are item-level faults: the record is skipped and the
/// rest of the batch carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    /// A transform was applied to an attribute of the wrong shape.
    #[error("Field '{field}' has unexpected type: expected {expected}")]
    TypeMismatch { field: String, expected: &'static str },

    /// A computed field rejected the record.
    #[error("Computed field '{field}' failed: {reason}")]
    Computed { field: String, reason: String },
}

impl MappingError {
    /// Create a type mismatch error.
    pub fn type_mismatch(field: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
        }
    }

    /// Create a computed field error.
    pub fn computed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Computed {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// An entity declaration is inconsistent with its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("Entity name '{0}' is invalid: use lowercase letters, digits and underscores")]
    InvalidName(String),

    #[error("Entity '{entity}' maps field '{field}' which is not declared in its schema")]
    UndeclaredField { entity: String, field: String },

    #[error("Entity '{entity}' maps the reserved discriminator field '{field}'")]
    ReservedField { entity: String, field: String },

    #[error("Entity '{entity}' has batch size 0")]
    ZeroBatchSize { entity: String },
}

/// Errors raised by the entity registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Entity '{0}' is already registered")]
    Duplicate(String),

    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),
}
