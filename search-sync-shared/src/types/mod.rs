//! Core data structures shared across the search sync crates.

pub mod document;
pub mod record;
pub mod schema;

pub use document::Document;
pub use record::{AttributeValue, Record, RelatedObject};
pub use schema::{DocumentSchema, FieldType};
