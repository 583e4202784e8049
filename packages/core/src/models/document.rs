//! Document Data Structures
//!
//! This module defines the in-memory `Document` node that mirrors one record
//! (or one embedded sub-record) of a document database aggregate.
//!
//! # Architecture
//!
//! - **Arena keys**: documents live in an [`Aggregate`](crate::services::Aggregate)
//!   table and refer to each other by [`DocumentKey`], never by ownership
//! - **Weak parent link**: `parent` is a back-reference only; children are
//!   owned through the parent's relation slots
//! - **Change tracking**: field writes are recorded until `move_changes`
//!   folds them into the persisted baseline
//!
//! # Examples
//!
//! ```rust
//! use docspace_core::models::Document;
//! use serde_json::json;
//!
//! let mut order = Document::new("order").with_field("number", json!("A-1001"));
//! assert!(order.is_new_record());
//! assert!(order.has_changes());
//!
//! order.move_changes();
//! assert!(!order.has_changes());
//! ```

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::RelationValue;

/// Validation errors for Document construction
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Index of a document inside its owning aggregate
///
/// Keys are only meaningful for the aggregate that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(usize);

impl DocumentKey {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A pending change to one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub name: String,

    /// Persisted value, `None` if the field was never persisted
    pub old: Option<Value>,

    /// Current value, `None` if the field was unset
    pub new: Option<Value>,
}

/// In-memory document node.
///
/// # Fields
///
/// - `id`: Unique identifier (UUID unless supplied)
/// - `doc_type`: Registered document type name (e.g., "order", "line_item")
/// - `fields`: Current attribute values
/// - `persisted`: Attribute values as of the last successful write
/// - `parent`: Weak back-reference to the embedding document
/// - `relations`: Loaded embedded relation slots, by relation name
/// - `descendants`: Lazily computed descendant list (never serialized)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier
    pub id: String,

    /// Document type name
    pub doc_type: String,

    fields: Map<String, Value>,

    persisted: Map<String, Value>,

    /// Names of fields with pending changes, in first-write order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    changed: Vec<String>,

    new_record: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last field modification timestamp
    pub modified_at: DateTime<Utc>,

    /// Time of the last successful write, `None` while new
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted_at: Option<DateTime<Utc>>,

    parent: Option<DocumentKey>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    relations: HashMap<String, RelationValue>,

    #[serde(skip)]
    descendants: Option<Vec<DocumentKey>>,
}

impl Document {
    /// Create a new, unsaved document with an auto-generated UUID
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), doc_type)
    }

    /// Create a new, unsaved document with an explicit ID
    pub fn new_with_id(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            fields: Map::new(),
            persisted: Map::new(),
            changed: Vec::new(),
            new_record: true,
            created_at: now,
            modified_at: now,
            persisted_at: None,
            parent: None,
            relations: HashMap::new(),
            descendants: None,
        }
    }

    /// Builder form of [`set_field`](Self::set_field)
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set_field(name, value);
        self
    }

    /// Validate identity fields
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if `id` or `doc_type` is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if self.doc_type.is_empty() {
            return Err(ValidationError::MissingField("doc_type".to_string()));
        }

        Ok(())
    }

    /// Current value of a field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// All current field values
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Persisted value of a field
    pub fn persisted_field(&self, name: &str) -> Option<&Value> {
        self.persisted.get(name)
    }

    /// Write a field and record the change.
    ///
    /// Writing back the persisted value drops the field from the pending
    /// changes.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.set_field_at(name, value, Utc::now());
    }

    /// [`set_field`](Self::set_field) with an explicit `modified_at` stamp
    pub fn set_field_at(&mut self, name: impl Into<String>, value: Value, at: DateTime<Utc>) {
        let name = name.into();
        let reverted = self.persisted.get(&name) == Some(&value);

        if reverted {
            self.changed.retain(|changed| changed != &name);
        } else if !self.changed.contains(&name) {
            self.changed.push(name.clone());
        }

        self.fields.insert(name, value);
        self.modified_at = at;
    }

    /// Remove a field and record the change
    pub fn unset_field(&mut self, name: &str) -> Option<Value> {
        self.unset_field_at(name, Utc::now())
    }

    /// [`unset_field`](Self::unset_field) with an explicit `modified_at` stamp
    pub fn unset_field_at(&mut self, name: &str, at: DateTime<Utc>) -> Option<Value> {
        let removed = self.fields.remove(name)?;

        if self.persisted.contains_key(name) {
            if !self.changed.iter().any(|changed| changed == name) {
                self.changed.push(name.to_string());
            }
        } else {
            self.changed.retain(|changed| changed != name);
        }

        self.modified_at = at;
        Some(removed)
    }

    /// Whether any field has a pending change
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Pending changes in first-write order
    pub fn changes(&self) -> Vec<FieldChange> {
        self.changed
            .iter()
            .map(|name| FieldChange {
                name: name.clone(),
                old: self.persisted.get(name).cloned(),
                new: self.fields.get(name).cloned(),
            })
            .collect()
    }

    /// Fold pending changes into the persisted baseline
    pub fn move_changes(&mut self) {
        for name in self.changed.drain(..) {
            match self.fields.get(&name) {
                Some(value) => {
                    self.persisted.insert(name, value.clone());
                }
                None => {
                    self.persisted.remove(&name);
                }
            }
        }
    }

    /// Whether the document has never been written
    pub fn is_new_record(&self) -> bool {
        self.new_record
    }

    /// Flag the document as durably saved
    pub fn mark_persisted(&mut self, at: DateTime<Utc>) {
        self.new_record = false;
        self.persisted_at = Some(at);
    }

    /// Parent back-reference, `None` for a root
    pub fn parent(&self) -> Option<DocumentKey> {
        self.parent
    }

    /// Whether this document has no parent
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Loaded value of an embedded relation.
    ///
    /// Returns `None` for a relation that is declared but not loaded; this
    /// accessor never loads anything.
    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }

    /// Forget every key-based link, so the document can join a new table
    pub(crate) fn detach_all(&mut self) {
        self.parent = None;
        self.relations.clear();
        self.descendants = None;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<DocumentKey>) {
        self.parent = parent;
    }

    pub(crate) fn relation_mut(&mut self, name: &str) -> Option<&mut RelationValue> {
        self.relations.get_mut(name)
    }

    pub(crate) fn load_relation(&mut self, name: &str, empty: RelationValue) -> &mut RelationValue {
        self.relations.entry(name.to_string()).or_insert(empty)
    }

    pub(crate) fn cached_descendants(&self) -> Option<&[DocumentKey]> {
        self.descendants.as_deref()
    }

    pub(crate) fn cache_descendants(&mut self, descendants: Vec<DocumentKey>) {
        self.descendants = Some(descendants);
    }

    /// Drop the descendant cache, returning whether one was present
    pub(crate) fn invalidate_descendants(&mut self) -> bool {
        self.descendants.take().is_some()
    }
}
