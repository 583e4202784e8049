//! Hierarchy Services
//!
//! This module contains the hierarchy bookkeeping for embedded document
//! aggregates:
//!
//! - `Aggregate` - Document table, parent links, descendant traversal,
//!   child removal and post-write persistence reset
//! - `HierarchyConfig` - Cache policy and parent-walk bounds
//! - `HierarchyError` - Precondition violations reported as errors
//!
//! Persistence commands call into these services after deciding what to
//! write; nothing here talks to a storage backend.

pub mod config;
pub mod error;
pub mod hierarchy;

pub use config::{CachePolicy, HierarchyConfig, DEFAULT_MAX_DEPTH};
pub use error::{HierarchyError, Result};
pub use hierarchy::Aggregate;
