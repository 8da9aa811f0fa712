//! Processor module for the search sync engine.
//!
//! Transforms source records into search documents.

mod document_processor;

pub use document_processor::{DocumentProcessor, MappingFailure, ProcessedBatch};
