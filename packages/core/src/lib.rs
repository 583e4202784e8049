//! DocSpace Embedded Document Hierarchy
//!
//! This crate keeps the parent/child bookkeeping of documents that are
//! nested inside one stored aggregate, the way document databases embed
//! child records in their parent record instead of separate tables.
//!
//! # Architecture
//!
//! - **Arena ownership**: an `Aggregate` owns every document; children are
//!   reachable through relation slots, parents only through keys
//! - **Schema-driven traversal**: relation names, cardinality and the
//!   versioned flag come from a `RelationMetadataProvider`
//! - **No I/O**: persistence commands decide when to write and report back
//!   through `reset_persisted_children`
//!
//! # Modules
//!
//! - [`models`] - Documents, relation metadata, document type registry
//! - [`services`] - The `Aggregate` hierarchy operations, config and errors

pub mod models;
pub mod services;

// Re-export commonly used types
pub use models::*;
pub use services::*;
