//! Declarative record-to-document mapping.
//!
//! - [`field`]: per-field transforms (direct copy, reference, computed)
//! - [`descriptor`]: the per-entity mapping table and its schema
//! - [`document_mapper`]: turns one record into one document

pub mod descriptor;
pub mod document_mapper;
pub mod field;

pub use descriptor::{EntityDescriptor, EntityMapping, DEFAULT_BATCH_SIZE, DISCRIMINATOR_FIELD};
pub use document_mapper::DocumentMapper;
pub use field::{ComputeFn, FieldTransform};
