// docstore-core/src/collection_core/mod.rs
// Collection logic over an injected `Storage`
//
// FILE STRUCTURE:
// ├── Constructor
// ├── Insert Operations   create_document, create_documents
// ├── Query Operations    find_document, find_documents, count_documents, distinct
// ├── Write Operations    update_*, replace_document, delete_*, bulk_write
// ├── Aggregation
// ├── Index Operations    create_index, remove_index, list_indexes
// └── Private Helpers

use std::sync::Arc;

use ahash::AHashSet;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::aggregation::Pipeline;
use crate::cursor::Cursor;
use crate::document::{Document, DocumentId, ID_FIELD};
use crate::error::{DocStoreError, Result};
use crate::find_options::Projection;
use crate::geo::Geodesy;
use crate::query::{Predicate, QueryCompiler};
use crate::storage::Storage;
use crate::value_utils::{get_nested_value, CanonicalValue};

pub mod bulk;
pub mod update;

pub use self::bulk::{BulkWriteResult, CompiledFilter, WriteModel};
pub use self::update::{Replacement, UpdateSpec};

/// Result of create_document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertOneResult {
    pub inserted_id: DocumentId,
}

/// Result of create_documents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<DocumentId>,
    pub inserted_count: usize,
}

/// Result of update_document / update_documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Result of replace_document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaceResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<DocumentId>,
}

/// Result of delete_document / delete_documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// A named collection over a shared store
///
/// Generic over the storage backend; `CollectionCore<MemoryStorage>` is the
/// in-process implementation. Every read hands out copies, every write goes
/// through the store as a whole-document replacement.
pub struct CollectionCore<S: Storage> {
    pub name: String,
    pub storage: Arc<RwLock<S>>,
    compiler: QueryCompiler,
}

impl<S: Storage> CollectionCore<S> {
    // ========== CONSTRUCTOR ==========

    /// Create new collection (or get existing)
    pub fn new(name: String, storage: Arc<RwLock<S>>, geodesy: Arc<dyn Geodesy>) -> Result<Self> {
        if storage.write().create_collection(&name)? {
            debug!(collection = %name, "created collection");
        }
        Ok(CollectionCore {
            name,
            storage,
            compiler: QueryCompiler::new(geodesy),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compile a filter with this collection's geodesy
    pub fn compile(&self, query: &Value) -> Result<Predicate> {
        self.compiler.compile(query)
    }

    // ========== INSERT OPERATIONS ==========

    /// Insert one document, generating an `_id` if it has none
    pub fn create_document(&self, document: Value) -> Result<InsertOneResult> {
        let document = Document::with_generated_id(document)?;
        let inserted_id = document.id().clone();
        self.storage.write().insert(&self.name, document)?;
        debug!(collection = %self.name, id = %inserted_id, "inserted document");
        Ok(InsertOneResult { inserted_id })
    }

    /// Insert many documents
    ///
    /// The whole batch is validated first: a malformed document or a
    /// duplicate `_id` (within the batch or against the store) inserts nothing.
    pub fn create_documents(&self, documents: Vec<Value>) -> Result<InsertManyResult> {
        let documents = documents
            .into_iter()
            .map(Document::with_generated_id)
            .collect::<Result<Vec<_>>>()?;

        let mut storage = self.storage.write();
        let mut seen = AHashSet::with_capacity(documents.len());
        for doc in &documents {
            let id = doc.id();
            let taken = !seen.insert(id.clone()) || storage.contains(&self.name, id);
            if taken {
                return Err(DocStoreError::DuplicateKey(format!(
                    "Duplicate _id {} in collection '{}'",
                    id, self.name
                )));
            }
        }

        let inserted_ids: Vec<DocumentId> = documents.iter().map(|d| d.id().clone()).collect();
        for doc in documents {
            storage.insert(&self.name, doc)?;
        }

        debug!(collection = %self.name, count = inserted_ids.len(), "inserted documents");
        Ok(InsertManyResult {
            inserted_count: inserted_ids.len(),
            inserted_ids,
        })
    }

    // ========== QUERY OPERATIONS ==========

    /// First matching document (projected), or `None`
    pub fn find_document(&self, query: &Value, projection: Option<&Value>) -> Result<Option<Value>> {
        let predicate = self.compile(query)?;
        let projection = parse_projection(projection)?;
        let found = self.find_one_matching(&predicate)?;
        Ok(found.map(|doc| match &projection {
            Some(p) => p.apply(doc.as_value()),
            None => doc.into_value(),
        }))
    }

    /// Cursor over all matching documents in insertion order
    pub fn find_documents(&self, query: &Value, projection: Option<&Value>) -> Result<Cursor> {
        let predicate = self.compile(query)?;
        let projection = parse_projection(projection)?;
        let docs = self.find_matching(&predicate)?;
        debug!(collection = %self.name, matched = docs.len(), "find");
        Ok(Cursor::with_projection(
            docs.into_iter().map(Document::into_value).collect(),
            projection,
        ))
    }

    /// Count matching documents (full scan)
    pub fn count_documents(&self, query: &Value) -> Result<u64> {
        let predicate = self.compile(query)?;
        Ok(self.find_matching(&predicate)?.len() as u64)
    }

    /// Distinct values of `field` among matching documents
    ///
    /// First-seen order; array values contribute their elements; documents
    /// without the field are skipped.
    pub fn distinct(&self, field: &str, query: &Value) -> Result<Vec<Value>> {
        let predicate = self.compile(query)?;
        let docs = self.find_matching(&predicate)?;

        let mut seen: AHashSet<CanonicalValue> = AHashSet::new();
        let mut distinct_values = Vec::new();
        let mut push = |value: &Value| {
            if seen.insert(CanonicalValue::from_value(value)) {
                distinct_values.push(value.clone());
            }
        };

        for doc in &docs {
            match get_nested_value(doc.as_value(), field) {
                Some(Value::Array(items)) => items.iter().for_each(&mut push),
                Some(value) => push(value),
                None => {}
            }
        }

        Ok(distinct_values)
    }

    // ========== WRITE OPERATIONS ==========

    /// Apply `$set` to the first matching document
    pub fn update_document(&self, query: &Value, update: &Value) -> Result<UpdateResult> {
        let update = UpdateSpec::parse(update)?;
        let predicate = self.compile(query)?;
        self.update_matching(&predicate, &update, false)
    }

    /// Apply `$set` to every matching document
    pub fn update_documents(&self, query: &Value, update: &Value) -> Result<UpdateResult> {
        let update = UpdateSpec::parse(update)?;
        let predicate = self.compile(query)?;
        self.update_matching(&predicate, &update, true)
    }

    /// Replace the first matching document, keeping its `_id`
    ///
    /// With `upsert` and no match, the replacement is inserted (taking the
    /// filter's literal `_id` when the replacement has none).
    pub fn replace_document(&self, query: &Value, replacement: &Value, upsert: bool) -> Result<ReplaceResult> {
        let replacement = Replacement::parse(replacement)?;
        let filter = CompiledFilter::compile(query, &self.compiler)?;
        self.replace_matching(&filter, replacement, upsert)
    }

    pub fn delete_document(&self, query: &Value) -> Result<DeleteResult> {
        let predicate = self.compile(query)?;
        self.delete_matching(&predicate, false)
    }

    pub fn delete_documents(&self, query: &Value) -> Result<DeleteResult> {
        let predicate = self.compile(query)?;
        self.delete_matching(&predicate, true)
    }

    /// Run a batch of write operations in order
    ///
    /// All operations are parsed before the first is applied. Execution is
    /// not atomic: on error, earlier operations stay applied.
    pub fn bulk_write(&self, operations: &Value) -> Result<BulkWriteResult> {
        let models = WriteModel::parse_all(operations, &self.compiler)?;
        let mut result = BulkWriteResult::default();

        for (index, model) in models.into_iter().enumerate() {
            match model {
                WriteModel::InsertOne { document } => {
                    let inserted = self.create_document(document)?;
                    result.inserted_count += 1;
                    result.inserted_ids.insert(index, inserted.inserted_id);
                }
                WriteModel::UpdateOne { filter, update } => {
                    let updated = self.update_matching(&filter.predicate, &update, false)?;
                    result.matched_count += updated.matched_count;
                    result.modified_count += updated.modified_count;
                }
                WriteModel::UpdateMany { filter, update } => {
                    let updated = self.update_matching(&filter.predicate, &update, true)?;
                    result.matched_count += updated.matched_count;
                    result.modified_count += updated.modified_count;
                }
                WriteModel::ReplaceOne {
                    filter,
                    replacement,
                    upsert,
                } => {
                    let replaced = self.replace_matching(&filter, replacement, upsert)?;
                    result.matched_count += replaced.matched_count;
                    result.modified_count += replaced.modified_count;
                    if let Some(id) = replaced.upserted_id {
                        result.upserted_count += 1;
                        result.upserted_ids.insert(index, id);
                    }
                }
                WriteModel::DeleteOne { filter } => {
                    result.deleted_count += self.delete_matching(&filter.predicate, false)?.deleted_count;
                }
                WriteModel::DeleteMany { filter } => {
                    result.deleted_count += self.delete_matching(&filter.predicate, true)?.deleted_count;
                }
            }
        }

        debug!(collection = %self.name, ?result, "bulk write");
        Ok(result)
    }

    /// Remove every document; the collection itself stays
    pub fn drop_collection(&self) -> Result<()> {
        let mut storage = self.storage.write();
        let removed = if storage.has_collection(&self.name) {
            storage.clear(&self.name)?
        } else {
            storage.create_collection(&self.name)?;
            0
        };
        info!(collection = %self.name, removed, "dropped collection");
        Ok(())
    }

    // ========== AGGREGATION ==========

    /// Run an aggregation pipeline over the whole collection
    pub fn aggregate(&self, pipeline: &Value) -> Result<Cursor> {
        let pipeline = Pipeline::parse(pipeline, &self.compiler)?;
        let docs = self
            .find_matching(&Predicate::always())?
            .into_iter()
            .map(Document::into_value)
            .collect();
        let results = pipeline.execute(docs)?;
        debug!(collection = %self.name, stages = pipeline.len(), results = results.len(), "aggregate");
        Ok(Cursor::new(results))
    }

    // ========== INDEX OPERATIONS ==========

    /// Record an index; the store may use it, query results never depend on it
    pub fn create_index(&self, keys: &Value) -> Result<String> {
        let name = self.storage.write().ensure_index(&self.name, keys)?;
        debug!(collection = %self.name, index = %name, "created index");
        Ok(name)
    }

    pub fn remove_index(&self, index_name: &str) -> Result<bool> {
        self.storage.write().drop_index(&self.name, index_name)
    }

    pub fn list_indexes(&self) -> Result<Vec<String>> {
        self.storage.read().list_indexes(&self.name)
    }

    // ========== PRIVATE HELPER METHODS ==========

    fn find_matching(&self, predicate: &Predicate) -> Result<Vec<Document>> {
        self.storage
            .read()
            .find(&self.name, &|doc: &Document| predicate.matches(doc))
    }

    fn find_one_matching(&self, predicate: &Predicate) -> Result<Option<Document>> {
        self.storage
            .read()
            .find_one(&self.name, &|doc: &Document| predicate.matches(doc))
    }

    fn update_matching(&self, predicate: &Predicate, update: &UpdateSpec, many: bool) -> Result<UpdateResult> {
        let targets = if many {
            self.find_matching(predicate)?
        } else {
            self.find_one_matching(predicate)?.into_iter().collect()
        };

        let mut result = UpdateResult::default();
        for doc in targets {
            result.matched_count += 1;
            let updated = update.apply(&doc)?;
            if updated != doc && self.storage.write().update(&self.name, updated)? {
                result.modified_count += 1;
            }
        }

        debug!(
            collection = %self.name,
            matched = result.matched_count,
            modified = result.modified_count,
            "update"
        );
        Ok(result)
    }

    fn replace_matching(&self, filter: &CompiledFilter, replacement: Replacement, upsert: bool) -> Result<ReplaceResult> {
        let existing = self.find_one_matching(&filter.predicate)?;

        let doc = match existing {
            Some(doc) => doc,
            None if upsert => {
                let fallback_id = filter
                    .json
                    .get(ID_FIELD)
                    .and_then(|id| DocumentId::from_value(id).ok());
                let document = replacement.into_new_document(fallback_id)?;
                let upserted_id = document.id().clone();
                self.storage.write().insert(&self.name, document)?;
                debug!(collection = %self.name, id = %upserted_id, "upserted document");
                return Ok(ReplaceResult {
                    upserted_id: Some(upserted_id),
                    ..ReplaceResult::default()
                });
            }
            None => return Ok(ReplaceResult::default()),
        };

        let new_doc = replacement.for_id(doc.id())?;
        let modified = new_doc != doc;

        // Copy-then-replace: the old document leaves the store, the new one is appended
        let mut storage = self.storage.write();
        storage.remove(&self.name, doc.id())?;
        storage.insert(&self.name, new_doc)?;

        debug!(collection = %self.name, id = %doc.id(), "replaced document");
        Ok(ReplaceResult {
            matched_count: 1,
            modified_count: u64::from(modified),
            upserted_id: None,
        })
    }

    fn delete_matching(&self, predicate: &Predicate, many: bool) -> Result<DeleteResult> {
        let targets = if many {
            self.find_matching(predicate)?
        } else {
            self.find_one_matching(predicate)?.into_iter().collect()
        };

        let mut storage = self.storage.write();
        let mut deleted_count = 0u64;
        for doc in targets {
            if storage.remove(&self.name, doc.id())?.is_some() {
                deleted_count += 1;
            }
        }

        debug!(collection = %self.name, deleted = deleted_count, "delete");
        Ok(DeleteResult { deleted_count })
    }
}

fn parse_projection(projection: Option<&Value>) -> Result<Option<Projection>> {
    match projection {
        Some(spec) => Projection::parse(spec),
        None => Ok(None),
    }
}
