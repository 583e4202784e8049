//! Embedded Relation Types
//!
//! Relation metadata describes the named slots a document type declares for
//! embedded children. Metadata is read-only for the hierarchy layer and is
//! provided by the [`SchemaRegistry`](crate::models::SchemaRegistry).
//!
//! ## Example Relation Metadata
//!
//! ```json
//! {
//!   "name": "line_items",
//!   "cardinality": "many",
//!   "targetType": "line_item",
//!   "versioned": false
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::models::DocumentKey;

/// Number of children an embedded relation can hold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// At most one embedded child (`embeds_one`)
    One,

    /// Ordered sequence of embedded children (`embeds_many`)
    Many,
}

/// Metadata for one embedded relation declared by a document type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelationMetadata {
    /// Relation name, unique within the declaring type
    pub name: String,

    /// Single or multi valued
    pub cardinality: Cardinality,

    /// Document type stored in this relation
    pub target_type: String,

    /// Versioned relations hold snapshots. Their children are collected as
    /// descendants but never recursed into.
    #[serde(default)]
    pub versioned: bool,
}

impl RelationMetadata {
    /// Declare a single-valued embedded relation
    pub fn one(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::One,
            target_type: target_type.into(),
            versioned: false,
        }
    }

    /// Declare a multi-valued embedded relation
    pub fn many(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::Many,
            target_type: target_type.into(),
            versioned: false,
        }
    }

    /// Mark the relation as versioned
    pub fn versioned(mut self) -> Self {
        self.versioned = true;
        self
    }

    /// Empty loaded value matching this relation's cardinality
    pub fn empty_value(&self) -> RelationValue {
        match self.cardinality {
            Cardinality::One => RelationValue::One(None),
            Cardinality::Many => RelationValue::Many(Vec::new()),
        }
    }
}

/// Loaded value of an embedded relation
///
/// A relation that was never loaded has no `RelationValue` at all; see
/// [`Document::relation`](crate::models::Document::relation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "cardinality", content = "children")]
pub enum RelationValue {
    One(Option<DocumentKey>),
    Many(Vec<DocumentKey>),
}

impl RelationValue {
    /// Children held by this slot, in order
    pub fn keys(&self) -> Vec<DocumentKey> {
        match self {
            Self::One(slot) => slot.iter().copied().collect(),
            Self::Many(keys) => keys.clone(),
        }
    }

    /// Whether `key` is held by this slot
    pub fn contains(&self, key: DocumentKey) -> bool {
        match self {
            Self::One(slot) => *slot == Some(key),
            Self::Many(keys) => keys.contains(&key),
        }
    }

    /// Whether the slot holds no children
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(slot) => slot.is_none(),
            Self::Many(keys) => keys.is_empty(),
        }
    }

    /// Remove `key` from the slot.
    ///
    /// A single-valued slot becomes absent; a multi-valued slot drops exactly
    /// the first matching entry and keeps the others in order. Returns
    /// `false` when `key` was not held.
    pub fn remove(&mut self, key: DocumentKey) -> bool {
        match self {
            Self::One(slot) => {
                if *slot == Some(key) {
                    *slot = None;
                    true
                } else {
                    false
                }
            }
            Self::Many(keys) => match keys.iter().position(|k| *k == key) {
                Some(index) => {
                    keys.remove(index);
                    true
                }
                None => false,
            },
        }
    }
}
