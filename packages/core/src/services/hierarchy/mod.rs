//! Embedded Document Hierarchy
//!
//! An [`Aggregate`] owns one root document and every document embedded in
//! it, at any depth. Documents are stored in a table and addressed by
//! [`DocumentKey`]; children are owned through their parent's relation
//! slots, and each child keeps a non-owning key back to its parent.
//!
//! # Operations
//!
//! - `collect_descendants` - Depth-first, declaration-order list of every
//!   embedded document below a node, memoized per node
//! - `parentize` - Overwrite a node's parent back-reference
//! - `root` - Follow parent links to the top
//! - `remove_child` - Take a child out of the parent's relation slot
//! - `reset_persisted_children` - Mark every descendant as saved after the
//!   aggregate was written
//! - `is_hereditary` - Schema inheritance query, forwarded to the registry
//!
//! # Descendant Cache
//!
//! `collect_descendants` stores its result on the document. With
//! [`CachePolicy::Invalidate`] every relation mutation drops the cache of the
//! mutated document and of all its ancestors. With [`CachePolicy::Retain`]
//! the cache lives as long as the document and callers must expect stale
//! lists after structural changes.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use docspace_core::models::{Document, DocumentType, RelationMetadata, SchemaRegistry};
//! use docspace_core::services::Aggregate;
//!
//! let registry = SchemaRegistry::from_definitions([
//!     DocumentType::new("post").with_relation(RelationMetadata::many("comments", "comment")),
//!     DocumentType::new("comment"),
//! ])?;
//!
//! let mut post = Aggregate::new(Arc::new(registry), Document::new("post"))?;
//! let root = post.root_key();
//! let comment = post.insert(Document::new("comment"))?;
//! post.embed(root, "comments", comment)?;
//!
//! assert_eq!(post.collect_descendants(root)?, vec![comment]);
//! assert_eq!(post.root(comment)?, root);
//! # Ok::<(), docspace_core::services::HierarchyError>(())
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::models::{
    Document, DocumentKey, RelationMetadataProvider, RelationValue,
    SystemTimeProvider, TimeProvider,
};
use crate::services::config::{CachePolicy, HierarchyConfig};
use crate::services::error::{HierarchyError, Result};

/// One aggregate root and its embedded documents
pub struct Aggregate {
    /// Document table; pruned slots become `None` and are never reused
    documents: Vec<Option<Document>>,
    root: DocumentKey,
    schema: Arc<dyn RelationMetadataProvider>,
    clock: Arc<dyn TimeProvider>,
    config: HierarchyConfig,
}

impl Aggregate {
    /// Create an aggregate around `root` with the default configuration
    pub fn new(schema: Arc<dyn RelationMetadataProvider>, root: Document) -> Result<Self> {
        Self::with_config(schema, root, HierarchyConfig::default())
    }

    /// Create an aggregate around `root`
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `config` fails validation
    /// - `ValidationFailed` if the root has no id or type
    /// - `UnknownDocumentType` if the root's type is not registered
    pub fn with_config(
        schema: Arc<dyn RelationMetadataProvider>,
        root: Document,
        config: HierarchyConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut aggregate = Self {
            documents: Vec::new(),
            root: DocumentKey::new(0),
            schema,
            clock: Arc::new(SystemTimeProvider),
            config,
        };
        aggregate.root = aggregate.insert(root)?;
        Ok(aggregate)
    }

    /// Replace the clock used to stamp `persisted_at`
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Key of the aggregate root
    pub fn root_key(&self) -> DocumentKey {
        self.root
    }

    /// Number of live documents, root included
    pub fn len(&self) -> usize {
        self.documents.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn contains(&self, key: DocumentKey) -> bool {
        self.get(key).is_ok()
    }

    pub fn document(&self, key: DocumentKey) -> Result<&Document> {
        self.get(key)
    }

    /// Mutable access for field writes.
    ///
    /// Relation slots and the parent link can only be changed through the
    /// aggregate's operations. Writes made here stamp `modified_at` with the
    /// system time; [`set_field`](Self::set_field) uses the aggregate clock.
    pub fn document_mut(&mut self, key: DocumentKey) -> Result<&mut Document> {
        self.get_mut(key)
    }

    /// Write a field of `key`, stamping `modified_at` with the aggregate clock
    pub fn set_field(
        &mut self,
        key: DocumentKey,
        name: impl Into<String>,
        value: Value,
    ) -> Result<()> {
        let at = self.clock.now();
        self.get_mut(key)?.set_field_at(name, value, at);
        Ok(())
    }

    /// Remove a field of `key`, stamping `modified_at` with the aggregate clock
    pub fn unset_field(&mut self, key: DocumentKey, name: &str) -> Result<Option<Value>> {
        let at = self.clock.now();
        Ok(self.get_mut(key)?.unset_field_at(name, at))
    }

    /// Add a detached document to the table.
    ///
    /// Any parent link or relation slot the document carried (for instance
    /// after deserialization) is discarded, since keys from another table
    /// mean nothing here.
    pub fn insert(&mut self, mut document: Document) -> Result<DocumentKey> {
        document.validate()?;

        if !self.schema.is_registered(&document.doc_type) {
            return Err(HierarchyError::UnknownDocumentType(document.doc_type));
        }

        document.detach_all();
        let key = DocumentKey::new(self.documents.len());
        tracing::trace!(
            %key,
            id = %document.id,
            doc_type = %document.doc_type,
            "Inserted document"
        );
        self.documents.push(Some(document));
        Ok(key)
    }

    /// Embed `child` under `parent` in the named relation.
    ///
    /// A single-valued relation replaces its previous occupant, which is
    /// detached (its parent link cleared) but stays in the table. A
    /// multi-valued relation appends.
    ///
    /// # Errors
    ///
    /// - `UnknownRelation` if the parent's type does not declare `relation`
    /// - `TypeMismatch` if the child's type does not fit the relation
    /// - `AlreadyEmbedded` if the child already has a parent
    /// - `CycleDetected` if the child is the parent itself, one of its
    ///   ancestors, or the aggregate root
    /// - `DepthExceeded` if the child's subtree would end up more than
    ///   `max_depth` links below its root
    pub fn embed(
        &mut self,
        parent: DocumentKey,
        relation: &str,
        child: DocumentKey,
    ) -> Result<()> {
        let parent_type = self.get(parent)?.doc_type.clone();
        let child_doc = self.get(child)?;

        let metadata = self
            .schema
            .relation(&parent_type, relation)
            .cloned()
            .ok_or_else(|| HierarchyError::unknown_relation(&parent_type, relation))?;

        if !self
            .schema
            .is_kind_of(&child_doc.doc_type, &metadata.target_type)
        {
            return Err(HierarchyError::type_mismatch(
                relation,
                &metadata.target_type,
                &child_doc.doc_type,
            ));
        }

        if let Some(existing) = child_doc.parent() {
            return Err(HierarchyError::already_embedded(child, existing));
        }

        if child == self.root {
            return Err(HierarchyError::cycle_detected(format!(
                "aggregate root {child} cannot be embedded"
            )));
        }

        let ancestors = self.ancestors(parent)?;
        if child == parent || ancestors.contains(&child) {
            return Err(HierarchyError::cycle_detected(format!(
                "{child} is {parent} or one of its ancestors"
            )));
        }

        let child_depth = ancestors.len() + 1;
        let height = self.height(child, self.config.max_depth.saturating_sub(child_depth))?;
        if child_depth + height > self.config.max_depth {
            return Err(HierarchyError::depth_exceeded(
                child,
                child_depth + height,
                self.config.max_depth,
            ));
        }

        let slot = self
            .get_mut(parent)?
            .load_relation(relation, metadata.empty_value());

        let displaced = match slot {
            RelationValue::One(occupant) => occupant.replace(child),
            RelationValue::Many(children) => {
                children.push(child);
                None
            }
        };

        if let Some(previous) = displaced {
            self.get_mut(previous)?.set_parent(None);
            tracing::debug!(%previous, %parent, relation, "Detached replaced child");
        }

        self.parentize(child, parent)?;
        self.invalidate_from(parent);

        tracing::debug!(%child, %parent, relation, "Embedded document");
        Ok(())
    }

    /// Overwrite `child`'s parent back-reference and return `parent`.
    ///
    /// This does not check that `parent` actually holds `child`; relation
    /// assignment ([`embed`](Self::embed)) is responsible for that.
    pub fn parentize(&mut self, child: DocumentKey, parent: DocumentKey) -> Result<DocumentKey> {
        self.get(parent)?;
        self.get_mut(child)?.set_parent(Some(parent));
        Ok(parent)
    }

    /// Parent of `key`, `None` for a root
    pub fn parent(&self, key: DocumentKey) -> Result<Option<DocumentKey>> {
        Ok(self.get(key)?.parent())
    }

    pub fn is_root(&self, key: DocumentKey) -> Result<bool> {
        Ok(self.get(key)?.is_root())
    }

    /// Parent chain of `key`, nearest first.
    ///
    /// # Errors
    ///
    /// `CycleDetected` once more than `max_depth` links were followed.
    pub fn ancestors(&self, key: DocumentKey) -> Result<Vec<DocumentKey>> {
        let mut chain = Vec::new();
        let mut current = self.get(key)?.parent();

        while let Some(parent) = current {
            if chain.len() >= self.config.max_depth {
                tracing::warn!(
                    %key,
                    max_depth = self.config.max_depth,
                    "Parent walk exceeded max depth"
                );
                return Err(HierarchyError::cycle_detected(format!(
                    "more than {} parent links above {key}",
                    self.config.max_depth
                )));
            }
            chain.push(parent);
            current = self.get(parent)?.parent();
        }

        Ok(chain)
    }

    /// Topmost document reached by following parent links from `key`;
    /// `key` itself when it has no parent.
    pub fn root(&self, key: DocumentKey) -> Result<DocumentKey> {
        Ok(self.ancestors(key)?.last().copied().unwrap_or(key))
    }

    /// Number of parent links between `key` and its root
    pub fn depth(&self, key: DocumentKey) -> Result<usize> {
        Ok(self.ancestors(key)?.len())
    }

    /// Loaded value of a relation. Never loads.
    ///
    /// Returns `Ok(None)` for a declared relation that is not loaded.
    pub fn relation_value(
        &self,
        key: DocumentKey,
        relation: &str,
    ) -> Result<Option<&RelationValue>> {
        let document = self.get(key)?;
        if self.schema.relation(&document.doc_type, relation).is_none() {
            return Err(HierarchyError::unknown_relation(
                &document.doc_type,
                relation,
            ));
        }
        Ok(document.relation(relation))
    }

    /// Mark a declared relation as loaded, empty if it was not loaded yet
    pub fn load_relation(&mut self, key: DocumentKey, relation: &str) -> Result<&RelationValue> {
        let doc_type = self.get(key)?.doc_type.clone();
        let empty = self
            .schema
            .relation(&doc_type, relation)
            .map(|metadata| metadata.empty_value())
            .ok_or_else(|| HierarchyError::unknown_relation(&doc_type, relation))?;

        Ok(&*self.get_mut(key)?.load_relation(relation, empty))
    }

    /// Direct children of `key` in relation declaration order
    pub fn children(&self, key: DocumentKey) -> Result<Vec<DocumentKey>> {
        Ok(self.child_keys(self.get(key)?))
    }

    /// Name of the relation of `parent` that holds `child`
    pub fn relation_name_of(
        &self,
        parent: DocumentKey,
        child: DocumentKey,
    ) -> Result<Option<String>> {
        let document = self.get(parent)?;

        Ok(self
            .schema
            .relations(&document.doc_type)
            .iter()
            .find(|metadata| {
                document
                    .relation(&metadata.name)
                    .is_some_and(|value| value.contains(child))
            })
            .map(|metadata| metadata.name.clone()))
    }

    /// Every document below `key`: for each relation in declaration order,
    /// each loaded child followed by its own descendants. Children of
    /// versioned relations are included but not recursed into.
    ///
    /// The walk keeps its own stack, so its depth is bounded by `max_depth`
    /// only. Every document visited on a cache miss gets its list memoized.
    ///
    /// # Errors
    ///
    /// `CycleDetected` if relation slots nest deeper than `max_depth`, which
    /// only happens when parent links were rewritten by hand.
    pub fn collect_descendants(&mut self, key: DocumentKey) -> Result<Vec<DocumentKey>> {
        if let Some(cached) = self.get(key)?.cached_descendants() {
            tracing::trace!(%key, count = cached.len(), "Descendant cache hit");
            return Ok(cached.to_vec());
        }

        let mut stack = vec![self.open_frame(key)?];
        let mut descendants = Vec::new();

        while let Some(frame) = stack.last_mut() {
            if let Some((child, versioned)) = frame.pending.pop() {
                frame.collected.push(child);
                if versioned {
                    continue;
                }

                if let Some(cached) = self.get(child)?.cached_descendants() {
                    frame.collected.extend_from_slice(cached);
                    continue;
                }

                if stack.len() > self.config.max_depth {
                    tracing::warn!(
                        %key,
                        max_depth = self.config.max_depth,
                        "Descendant walk exceeded max depth"
                    );
                    return Err(HierarchyError::cycle_detected(format!(
                        "embedding deeper than {} levels below {key}",
                        self.config.max_depth
                    )));
                }
                let next = self.open_frame(child)?;
                stack.push(next);
                continue;
            }

            let Some(done) = stack.pop() else { break };
            tracing::trace!(
                key = %done.key,
                count = done.collected.len(),
                "Descendant cache miss"
            );
            self.get_mut(done.key)?.cache_descendants(done.collected.clone());

            match stack.last_mut() {
                Some(parent) => parent.collected.extend(done.collected),
                None => descendants = done.collected,
            }
        }

        Ok(descendants)
    }

    fn open_frame(&self, key: DocumentKey) -> Result<CollectFrame> {
        let document = self.get(key)?;
        let mut pending: Vec<(DocumentKey, bool)> = self
            .schema
            .relations(&document.doc_type)
            .iter()
            .filter_map(|metadata| {
                document
                    .relation(&metadata.name)
                    .map(|value| (metadata.versioned, value.keys()))
            })
            .flat_map(|(versioned, keys)| keys.into_iter().map(move |child| (child, versioned)))
            .collect();
        pending.reverse();

        Ok(CollectFrame {
            key,
            pending,
            collected: Vec::new(),
        })
    }

    /// Take `child` out of whichever relation of `parent` holds it.
    ///
    /// A single-valued slot becomes absent; a multi-valued slot loses exactly
    /// that entry. The child's parent link is cleared; the child stays in the
    /// table until [`prune`](Self::prune)d.
    ///
    /// # Errors
    ///
    /// `ChildNotFound` if no relation of `parent` holds `child`.
    pub fn remove_child(&mut self, parent: DocumentKey, child: DocumentKey) -> Result<()> {
        let relation = self
            .relation_name_of(parent, child)?
            .ok_or_else(|| HierarchyError::child_not_found(parent, child))?;

        let removed = self
            .get_mut(parent)?
            .relation_mut(&relation)
            .is_some_and(|value| value.remove(child));
        if !removed {
            return Err(HierarchyError::child_not_found(parent, child));
        }

        if let Ok(document) = self.get_mut(child) {
            if document.parent() == Some(parent) {
                document.set_parent(None);
            }
        }
        self.invalidate_from(parent);

        tracing::debug!(%child, %parent, relation = %relation, "Removed embedded document");
        Ok(())
    }

    /// After the aggregate was written: fold pending changes into the
    /// persisted baseline of every descendant of `key` and flag each one as
    /// no longer new. Returns the descendants.
    ///
    /// Keys of documents pruned since the list was cached are skipped.
    pub fn reset_persisted_children(&mut self, key: DocumentKey) -> Result<Vec<DocumentKey>> {
        let descendants = self.collect_descendants(key)?;
        let persisted_at = self.clock.now();

        for descendant in &descendants {
            match self.get_mut(*descendant) {
                Ok(document) => {
                    document.move_changes();
                    document.mark_persisted(persisted_at);
                }
                Err(_) => tracing::trace!(key = %descendant, "Skipping pruned descendant"),
            }
        }

        tracing::debug!(%key, count = descendants.len(), "Reset persisted descendants");
        Ok(descendants)
    }

    /// Whether the document's type derives from another document type
    pub fn is_hereditary(&self, key: DocumentKey) -> Result<bool> {
        Ok(self.schema.is_hereditary(&self.get(key)?.doc_type))
    }

    /// Drop a detached document and everything embedded in it.
    ///
    /// Returns the removed documents, `key` first, then its descendants
    /// depth-first in relation declaration order (versioned relations
    /// included). Their keys are never reissued.
    ///
    /// # Errors
    ///
    /// `StillAttached` for the aggregate root or a document with a parent.
    pub fn prune(&mut self, key: DocumentKey) -> Result<Vec<Document>> {
        let document = self.get(key)?;
        if key == self.root || document.parent().is_some() {
            return Err(HierarchyError::StillAttached { key });
        }

        let mut removed = Vec::new();
        let mut pending = vec![key];
        while let Some(next) = pending.pop() {
            let Some(document) = self
                .documents
                .get_mut(next.index())
                .and_then(Option::take)
            else {
                continue;
            };
            pending.extend(self.child_keys(&document).into_iter().rev());
            removed.push(document);
        }

        tracing::debug!(%key, count = removed.len(), "Pruned detached subtree");
        Ok(removed)
    }

    /// Keys held by the loaded relations of `document`, in declaration order
    fn child_keys(&self, document: &Document) -> Vec<DocumentKey> {
        self.schema
            .relations(&document.doc_type)
            .iter()
            .filter_map(|metadata| document.relation(&metadata.name))
            .flat_map(RelationValue::keys)
            .collect()
    }

    /// Levels of embedded documents below `key`, counted up to `limit + 1`
    fn height(&self, key: DocumentKey, limit: usize) -> Result<usize> {
        let mut level = vec![key];
        let mut height = 0;

        while height <= limit {
            let mut next = Vec::new();
            for key in &level {
                next.extend(self.child_keys(self.get(*key)?));
            }
            if next.is_empty() {
                break;
            }
            height += 1;
            level = next;
        }

        Ok(height)
    }

    /// Drop descendant caches from `key` up to its root
    fn invalidate_from(&mut self, key: DocumentKey) {
        if self.config.cache_policy == CachePolicy::Retain {
            return;
        }

        let mut current = Some(key);
        let mut cleared = 0usize;
        for _ in 0..=self.config.max_depth {
            let Some(next) = current else { break };
            let Ok(document) = self.get_mut(next) else { break };
            if document.invalidate_descendants() {
                cleared += 1;
            }
            current = document.parent();
        }

        tracing::trace!(%key, cleared, "Invalidated descendant caches");
    }

    fn get(&self, key: DocumentKey) -> Result<&Document> {
        self.documents
            .get(key.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| HierarchyError::document_not_found(key))
    }

    fn get_mut(&mut self, key: DocumentKey) -> Result<&mut Document> {
        self.documents
            .get_mut(key.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| HierarchyError::document_not_found(key))
    }
}

/// One document on the explicit stack of `collect_descendants`
struct CollectFrame {
    key: DocumentKey,
    /// Children still to visit with their relation's versioned flag, next last
    pending: Vec<(DocumentKey, bool)>,
    collected: Vec<DocumentKey>,
}

impl std::fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregate")
            .field("root", &self.root)
            .field("documents", &self.len())
            .field("config", &self.config)
            .finish()
    }
}
