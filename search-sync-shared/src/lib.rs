//! # Search Sync Shared
//!
//! This crate defines the I/O-free building blocks of the search sync engine:
//! the source records handed over by the data layer, the document schemas
//! declared for each searchable entity type, the field mappers that turn one
//! into the other, and the schema fingerprint used to version physical indices.

pub mod errors;
pub mod fingerprint;
pub mod mapping;
pub mod registry;
pub mod types;

pub use errors::{DescriptorError, MappingError, RegistryError};
pub use fingerprint::{
    canonicalize, fingerprint, fingerprint_value, SchemaFingerprint, FINGERPRINT_HEX_LEN,
};
pub use mapping::{
    ComputeFn, DocumentMapper, EntityDescriptor, EntityMapping, FieldTransform,
    DEFAULT_BATCH_SIZE, DISCRIMINATOR_FIELD,
};
pub use registry::EntityRegistry;
pub use types::{AttributeValue, Document, DocumentSchema, FieldType, Record, RelatedObject};
