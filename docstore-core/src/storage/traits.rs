// src/storage/traits.rs
//! Storage abstraction for the document store
//!
//! `CollectionCore` talks to documents only through this trait. Callers never
//! receive references into the store: reads return copies and writes take
//! owned documents (copy-then-replace).
//!
//! # Architecture
//!
//! ```text
//! Storage trait (unified interface)
//!   └── MemoryStorage (insertion-ordered, in-memory)
//! ```

use serde_json::Value;

use crate::document::{Document, DocumentId};
use crate::error::Result;

/// Document predicate passed down to `find` / `find_one`
pub type DocumentFilter<'a> = &'a dyn Fn(&Document) -> bool;

/// Core storage abstraction
///
/// Reads on an unknown collection return nothing; writes fail with
/// `CollectionNotFound`.
pub trait Storage: Send + Sync {
    // ========================================================================
    // COLLECTION MANAGEMENT
    // ========================================================================

    /// Create a collection; returns `false` if it already existed
    fn create_collection(&mut self, name: &str) -> Result<bool>;

    fn has_collection(&self, name: &str) -> bool;

    /// Collection names in creation order
    fn list_collections(&self) -> Vec<String>;

    /// Remove every collection
    fn drop_all(&mut self) -> Result<()>;

    // ========================================================================
    // DOCUMENT OPERATIONS
    // ========================================================================

    /// Append a document; fails with `DuplicateKey` if its `_id` is taken
    fn insert(&mut self, collection: &str, doc: Document) -> Result<()>;

    /// Copies of all matching documents, in insertion order
    fn find(&self, collection: &str, filter: DocumentFilter<'_>) -> Result<Vec<Document>>;

    /// Copy of the first matching document
    fn find_one(&self, collection: &str, filter: DocumentFilter<'_>) -> Result<Option<Document>>;

    /// Whether a document with this `_id` is stored
    fn contains(&self, collection: &str, id: &DocumentId) -> bool;

    /// Replace the stored document with the same `_id` in place
    ///
    /// Returns `false` when no document with that `_id` exists.
    fn update(&mut self, collection: &str, doc: Document) -> Result<bool>;

    /// Remove a document by `_id`, returning it if it existed
    fn remove(&mut self, collection: &str, id: &DocumentId) -> Result<Option<Document>>;

    /// Remove every document of a collection, keeping the collection
    ///
    /// Returns the number of documents removed.
    fn clear(&mut self, collection: &str) -> Result<usize>;

    // ========================================================================
    // INDEX BOOKKEEPING
    // ========================================================================

    /// Record an index over `keys` (`{field: 1 | -1}`); returns its name
    fn ensure_index(&mut self, collection: &str, keys: &Value) -> Result<String>;

    /// Forget an index; returns `false` if it was not known
    fn drop_index(&mut self, collection: &str, name: &str) -> Result<bool>;

    fn list_indexes(&self, collection: &str) -> Result<Vec<String>>;
}
