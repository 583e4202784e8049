//! Document Type Registry
//!
//! Document types declare their embedded relations and, optionally, a
//! superclass. The [`SchemaRegistry`] resolves inherited relations once at
//! registration time and answers the two questions the hierarchy layer asks
//! of a type: which relations does it embed, and is it hereditary.
//!
//! ## Schema Inheritance
//!
//! A type registered with a `superclass` is **hereditary**. It embeds every
//! relation of its superclass (declared first, in superclass order) followed
//! by its own. Hereditary-ness is a type-level property and has nothing to do
//! with where a document sits in an embedding tree.
//!
//! ## Example Type Definition
//!
//! ```json
//! {
//!   "name": "invoice",
//!   "superclass": "order",
//!   "relations": [
//!     { "name": "payments", "cardinality": "many", "targetType": "payment" }
//!   ]
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RelationMetadata;

/// Errors raised while registering document types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Document type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Document type '{doc_type}' declares relation '{relation}' more than once")]
    DuplicateRelation { doc_type: String, relation: String },

    #[error("Document type '{doc_type}' extends unregistered type '{superclass}'")]
    UnknownSuperclass {
        doc_type: String,
        superclass: String,
    },
}

/// Read-only relation metadata, as consumed by the hierarchy layer
///
/// Implemented by [`SchemaRegistry`]. Any other source of type metadata can
/// drive an [`Aggregate`](crate::services::Aggregate) by implementing it.
pub trait RelationMetadataProvider: Send + Sync {
    /// Embedded relations of `doc_type` in declaration order (inherited
    /// relations first). Unknown types have none.
    fn relations(&self, doc_type: &str) -> &[RelationMetadata];

    /// Whether `doc_type` is registered
    fn is_registered(&self, doc_type: &str) -> bool;

    /// Whether `doc_type` derives from another document type
    fn is_hereditary(&self, doc_type: &str) -> bool;

    /// Whether `doc_type` is `ancestor` or one of its subtypes
    fn is_kind_of(&self, doc_type: &str, ancestor: &str) -> bool;

    /// Metadata of one relation of `doc_type`
    fn relation(&self, doc_type: &str, name: &str) -> Option<&RelationMetadata> {
        self.relations(doc_type).iter().find(|r| r.name == name)
    }
}

/// Definition of a document type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentType {
    /// Type name (must be unique within a registry)
    pub name: String,

    /// Registered type this one extends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,

    /// Relations declared by this type itself, in declaration order
    #[serde(default)]
    pub relations: Vec<RelationMetadata>,
}

impl DocumentType {
    /// Base document type with no superclass
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            relations: Vec::new(),
        }
    }

    /// Document type extending `superclass`
    pub fn subclass_of(name: impl Into<String>, superclass: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: Some(superclass.into()),
            relations: Vec::new(),
        }
    }

    /// Append an embedded relation declaration
    pub fn with_relation(mut self, relation: RelationMetadata) -> Self {
        self.relations.push(relation);
        self
    }
}

#[derive(Debug, Clone)]
struct RegisteredType {
    definition: DocumentType,

    /// Inherited plus own relations
    relations: Vec<RelationMetadata>,
}

/// Registry of document types
///
/// Build it once, then share it read-only (`Arc<SchemaRegistry>`) between
/// aggregates.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, RegisteredType>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register each definition in order
    ///
    /// Superclasses must precede their subtypes.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = DocumentType>,
    ) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Register a document type.
    ///
    /// # Errors
    ///
    /// - `MissingField` if the type or one of its relations has no name
    /// - `DuplicateType` if the name is taken
    /// - `UnknownSuperclass` if the superclass is not registered yet
    /// - `DuplicateRelation` if a relation name repeats, including across
    ///   the superclass chain
    pub fn register(&mut self, definition: DocumentType) -> Result<(), SchemaError> {
        if definition.name.is_empty() {
            return Err(SchemaError::MissingField("name".to_string()));
        }

        if self.types.contains_key(&definition.name) {
            return Err(SchemaError::DuplicateType(definition.name));
        }

        let mut relations = match &definition.superclass {
            Some(superclass) => self
                .types
                .get(superclass)
                .map(|parent| parent.relations.clone())
                .ok_or_else(|| SchemaError::UnknownSuperclass {
                    doc_type: definition.name.clone(),
                    superclass: superclass.clone(),
                })?,
            None => Vec::new(),
        };

        for relation in &definition.relations {
            if relation.name.is_empty() {
                return Err(SchemaError::MissingField("relation name".to_string()));
            }
            if relations.iter().any(|r| r.name == relation.name) {
                return Err(SchemaError::DuplicateRelation {
                    doc_type: definition.name.clone(),
                    relation: relation.name.clone(),
                });
            }
            relations.push(relation.clone());
        }

        tracing::debug!(
            doc_type = %definition.name,
            superclass = ?definition.superclass,
            relations = relations.len(),
            "Registered document type"
        );

        self.types.insert(
            definition.name.clone(),
            RegisteredType {
                definition,
                relations,
            },
        );
        Ok(())
    }

    /// Definition of a registered type, as it was declared
    pub fn get(&self, doc_type: &str) -> Option<&DocumentType> {
        self.types.get(doc_type).map(|t| &t.definition)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl RelationMetadataProvider for SchemaRegistry {
    fn relations(&self, doc_type: &str) -> &[RelationMetadata] {
        self.types
            .get(doc_type)
            .map(|t| t.relations.as_slice())
            .unwrap_or(&[])
    }

    fn is_registered(&self, doc_type: &str) -> bool {
        self.types.contains_key(doc_type)
    }

    fn is_hereditary(&self, doc_type: &str) -> bool {
        self.get(doc_type)
            .is_some_and(|definition| definition.superclass.is_some())
    }

    fn is_kind_of(&self, doc_type: &str, ancestor: &str) -> bool {
        let mut current = Some(doc_type);
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.get(name).and_then(|d| d.superclass.as_deref());
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cardinality;
    use serde_json::json;

    fn create_test_registry() -> SchemaRegistry {
        SchemaRegistry::from_definitions([
            DocumentType::new("order")
                .with_relation(RelationMetadata::one("shipping_address", "address"))
                .with_relation(RelationMetadata::many("line_items", "line_item")),
            DocumentType::subclass_of("invoice", "order")
                .with_relation(RelationMetadata::many("revisions", "order").versioned()),
            DocumentType::new("line_item"),
            DocumentType::new("address"),
        ])
        .unwrap()
    }

    #[test]
    fn test_relations_in_declaration_order() {
        let registry = create_test_registry();

        let names: Vec<_> = registry
            .relations("order")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["shipping_address", "line_items"]);
    }

    #[test]
    fn test_subtype_inherits_superclass_relations_first() {
        let registry = create_test_registry();

        let names: Vec<_> = registry
            .relations("invoice")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["shipping_address", "line_items", "revisions"]);
        assert!(registry.relation("invoice", "revisions").unwrap().versioned);
    }

    #[test]
    fn test_is_hereditary() {
        let registry = create_test_registry();

        assert!(!registry.is_hereditary("order"));
        assert!(registry.is_hereditary("invoice"));
        assert!(!registry.is_hereditary("unknown"));
    }

    #[test]
    fn test_is_kind_of() {
        let registry = create_test_registry();

        assert!(registry.is_kind_of("invoice", "order"));
        assert!(registry.is_kind_of("order", "order"));
        assert!(!registry.is_kind_of("order", "invoice"));
        assert!(!registry.is_kind_of("address", "order"));
    }

    #[test]
    fn test_unknown_type_has_no_relations() {
        let registry = create_test_registry();

        assert!(registry.relations("ghost").is_empty());
        assert!(registry.relation("ghost", "anything").is_none());
        assert!(!registry.is_registered("ghost"));
    }

    #[test]
    fn test_register_rejects_duplicate_type() {
        let mut registry = create_test_registry();

        let err = registry.register(DocumentType::new("order")).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateType("order".to_string()));
    }

    #[test]
    fn test_register_rejects_unknown_superclass() {
        let mut registry = SchemaRegistry::new();

        let err = registry
            .register(DocumentType::subclass_of("invoice", "order"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownSuperclass { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_rejects_relation_shadowing_superclass() {
        let mut registry = create_test_registry();

        let err = registry
            .register(
                DocumentType::subclass_of("credit_note", "order")
                    .with_relation(RelationMetadata::many("line_items", "line_item")),
            )
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateRelation {
                doc_type: "credit_note".to_string(),
                relation: "line_items".to_string(),
            }
        );
    }

    #[test]
    fn test_register_rejects_unnamed_type() {
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            registry.register(DocumentType::new("")),
            Err(SchemaError::MissingField(_))
        ));
    }

    #[test]
    fn test_deserialization() {
        let json = json!([
            { "name": "post", "relations": [
                { "name": "comments", "cardinality": "many", "targetType": "comment" }
            ]},
            { "name": "comment" }
        ]);

        let definitions: Vec<DocumentType> = serde_json::from_value(json).unwrap();
        let registry = SchemaRegistry::from_definitions(definitions).unwrap();

        assert_eq!(registry.len(), 2);
        let comments = registry.relation("post", "comments").unwrap();
        assert_eq!(comments.cardinality, Cardinality::Many);
        assert!(!comments.versioned);
    }
}
