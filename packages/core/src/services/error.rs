//! Hierarchy Error Types
//!
//! Precondition violations of the hierarchy operations are reported as
//! errors instead of looping, panicking, or silently doing nothing.

use crate::models::{DocumentKey, SchemaError, ValidationError};
use thiserror::Error;

/// Hierarchy operation errors
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// Key not issued by this aggregate, or already pruned
    #[error("Document not found: {key}")]
    DocumentNotFound { key: DocumentKey },

    /// `remove_child` called with a document the parent does not hold
    #[error("Document {child} is not embedded in {parent}")]
    ChildNotFound {
        parent: DocumentKey,
        child: DocumentKey,
    },

    /// Relation not declared for the document's type
    #[error("Document type '{doc_type}' has no embedded relation '{relation}'")]
    UnknownRelation { doc_type: String, relation: String },

    /// Document type not registered
    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    /// Child type does not fit the relation's target type
    #[error("Relation '{relation}' embeds '{expected}' documents, got '{actual}'")]
    TypeMismatch {
        relation: String,
        expected: String,
        actual: String,
    },

    /// Child is already embedded somewhere
    #[error("Document {child} is already embedded in {parent}")]
    AlreadyEmbedded {
        child: DocumentKey,
        parent: DocumentKey,
    },

    /// Parent links would form, or already form, a cycle
    #[error("Circular hierarchy detected: {context}")]
    CycleDetected { context: String },

    /// Embedding would nest documents deeper than `max_depth`
    #[error("Embedding {child} would reach depth {depth}, max depth is {max_depth}")]
    DepthExceeded {
        child: DocumentKey,
        depth: usize,
        max_depth: usize,
    },

    /// Prune of a document that is still embedded
    #[error("Document {key} is still attached to a parent")]
    StillAttached { key: DocumentKey },

    /// Document failed validation on insert
    #[error("Document validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Type registration failed
    #[error("Schema error: {0}")]
    SchemaError(#[from] SchemaError),

    /// Configuration rejected by `HierarchyConfig::validate`
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HierarchyError {
    pub fn document_not_found(key: DocumentKey) -> Self {
        Self::DocumentNotFound { key }
    }

    pub fn child_not_found(parent: DocumentKey, child: DocumentKey) -> Self {
        Self::ChildNotFound { parent, child }
    }

    pub fn unknown_relation(doc_type: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownRelation {
            doc_type: doc_type.into(),
            relation: relation.into(),
        }
    }

    pub fn type_mismatch(
        relation: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            relation: relation.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn already_embedded(child: DocumentKey, parent: DocumentKey) -> Self {
        Self::AlreadyEmbedded { child, parent }
    }

    pub fn cycle_detected(context: impl Into<String>) -> Self {
        Self::CycleDetected {
            context: context.into(),
        }
    }

    pub fn depth_exceeded(child: DocumentKey, depth: usize, max_depth: usize) -> Self {
        Self::DepthExceeded {
            child,
            depth,
            max_depth,
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, HierarchyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HierarchyError::child_not_found(DocumentKey::new(0), DocumentKey::new(5));
        assert_eq!(err.to_string(), "Document #5 is not embedded in #0");

        let err = HierarchyError::unknown_relation("order", "notes");
        assert_eq!(
            err.to_string(),
            "Document type 'order' has no embedded relation 'notes'"
        );

        let err = HierarchyError::cycle_detected("#3 under #7");
        assert_eq!(err.to_string(), "Circular hierarchy detected: #3 under #7");

        let err = HierarchyError::depth_exceeded(DocumentKey::new(4), 9, 8);
        assert_eq!(
            err.to_string(),
            "Embedding #4 would reach depth 9, max depth is 8"
        );
    }

    #[test]
    fn test_error_from_schema_error() {
        let err: HierarchyError = SchemaError::DuplicateType("order".to_string()).into();

        match err {
            HierarchyError::SchemaError(SchemaError::DuplicateType(name)) => {
                assert_eq!(name, "order")
            }
            other => panic!("Expected SchemaError, got {other:?}"),
        }
    }

    #[test]
    fn test_error_from_validation_error() {
        let err: HierarchyError = ValidationError::MissingField("id".to_string()).into();
        assert!(err.to_string().contains("Missing required field: id"));
    }
}
