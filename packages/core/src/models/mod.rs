//! Data Models
//!
//! This module contains the core data structures of an embedded document
//! aggregate:
//!
//! - `Document` - In-memory node with change tracking and a weak parent link
//! - `RelationMetadata` / `RelationValue` - Embedded relation slots
//! - `SchemaRegistry` - Document types, inherited relations, hereditary flag
//! - `TimeProvider` - Clock used for persistence timestamps

mod document;
mod relation;
pub mod schema;
pub mod time;

pub use document::{Document, DocumentKey, FieldChange, ValidationError};
pub use relation::{Cardinality, RelationMetadata, RelationValue};
pub use schema::{DocumentType, RelationMetadataProvider, SchemaError, SchemaRegistry};
pub use time::{FixedTimeProvider, SystemTimeProvider, TimeProvider};
