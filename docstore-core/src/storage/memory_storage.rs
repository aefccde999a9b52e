// storage/memory_storage.rs
//! In-memory storage backend
//!
//! # Architecture
//!
//! ```text
//! MemoryStorage (Storage trait implementation)
//!      ↓
//! IndexMap<String, MemoryCollection>          (collections, creation order)
//!      ↓
//! IndexMap<DocumentId, Document>              (documents, insertion order)
//! ```

use indexmap::IndexMap;
use serde_json::Value;

use crate::document::{Document, DocumentId};
use crate::error::{DocStoreError, Result};
use crate::storage::{DocumentFilter, Storage};

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: IndexMap<DocumentId, Document>,
    /// Index name -> key specification
    indexes: IndexMap<String, Value>,
}

/// In-memory storage backend
///
/// Nothing is persisted; data is lost when the storage is dropped.
///
/// # Examples
///
/// ```
/// use docstore_core::storage::{MemoryStorage, Storage};
///
/// let mut storage = MemoryStorage::new();
/// assert!(storage.create_collection("stops").unwrap());
/// assert_eq!(storage.list_collections(), vec!["stops"]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: IndexMap<String, MemoryCollection>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> Option<&MemoryCollection> {
        self.collections.get(name)
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut MemoryCollection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| DocStoreError::CollectionNotFound(name.to_string()))
    }
}

/// Index name in the `field_1_other_-1` convention
fn index_name(keys: &Value) -> Result<String> {
    let obj = keys
        .as_object()
        .filter(|obj| !obj.is_empty())
        .ok_or_else(|| {
            DocStoreError::InvalidQuery(format!("Index keys must be a non-empty object, got {}", keys))
        })?;

    let parts: Vec<String> = obj
        .iter()
        .map(|(field, direction)| match direction {
            Value::String(s) => format!("{}_{}", field, s),
            other => format!("{}_{}", field, other),
        })
        .collect();
    Ok(parts.join("_"))
}

impl Storage for MemoryStorage {
    // ========================================================================
    // COLLECTION MANAGEMENT
    // ========================================================================

    fn create_collection(&mut self, name: &str) -> Result<bool> {
        if self.collections.contains_key(name) {
            return Ok(false);
        }
        self.collections
            .insert(name.to_string(), MemoryCollection::default());
        Ok(true)
    }

    fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    fn list_collections(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    fn drop_all(&mut self) -> Result<()> {
        self.collections.clear();
        Ok(())
    }

    // ========================================================================
    // DOCUMENT OPERATIONS
    // ========================================================================

    fn insert(&mut self, collection: &str, doc: Document) -> Result<()> {
        let coll = self.collection_mut(collection)?;
        if coll.documents.contains_key(doc.id()) {
            return Err(DocStoreError::DuplicateKey(format!(
                "Duplicate _id {} in collection '{}'",
                doc.id(),
                collection
            )));
        }
        coll.documents.insert(doc.id().clone(), doc);
        Ok(())
    }

    fn find(&self, collection: &str, filter: DocumentFilter<'_>) -> Result<Vec<Document>> {
        Ok(match self.collection(collection) {
            Some(coll) => coll
                .documents
                .values()
                .filter(|doc| filter(doc))
                .cloned()
                .collect(),
            None => Vec::new(),
        })
    }

    fn find_one(&self, collection: &str, filter: DocumentFilter<'_>) -> Result<Option<Document>> {
        Ok(self
            .collection(collection)
            .and_then(|coll| coll.documents.values().find(|doc| filter(doc)).cloned()))
    }

    fn contains(&self, collection: &str, id: &DocumentId) -> bool {
        self.collection(collection)
            .map(|coll| coll.documents.contains_key(id))
            .unwrap_or(false)
    }

    fn update(&mut self, collection: &str, doc: Document) -> Result<bool> {
        let coll = self.collection_mut(collection)?;
        match coll.documents.get_mut(doc.id()) {
            Some(stored) => {
                *stored = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&mut self, collection: &str, id: &DocumentId) -> Result<Option<Document>> {
        let coll = self.collection_mut(collection)?;
        Ok(coll.documents.shift_remove(id))
    }

    fn clear(&mut self, collection: &str) -> Result<usize> {
        let coll = self.collection_mut(collection)?;
        let removed = coll.documents.len();
        coll.documents.clear();
        Ok(removed)
    }

    // ========================================================================
    // INDEX BOOKKEEPING
    // ========================================================================

    fn ensure_index(&mut self, collection: &str, keys: &Value) -> Result<String> {
        let name = index_name(keys)?;
        let coll = self.collection_mut(collection)?;
        coll.indexes.entry(name.clone()).or_insert_with(|| keys.clone());
        Ok(name)
    }

    fn drop_index(&mut self, collection: &str, name: &str) -> Result<bool> {
        let coll = self.collection_mut(collection)?;
        Ok(coll.indexes.shift_remove(name).is_some())
    }

    fn list_indexes(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .collection(collection)
            .map(|coll| coll.indexes.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
