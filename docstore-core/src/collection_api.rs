// docstore-core/src/collection_api.rs
//! Backend-neutral collection contract
//!
//! Code that should run against any backend (the batch protocol, callers'
//! own helpers) takes `&impl DocumentCollection` instead of a concrete type.

use serde_json::Value;

use crate::collection_core::{
    BulkWriteResult, CollectionCore, DeleteResult, InsertManyResult, InsertOneResult,
    ReplaceResult, UpdateResult,
};
use crate::cursor::Cursor;
use crate::error::Result;
use crate::storage::Storage;

pub trait DocumentCollection {
    fn collection_name(&self) -> &str;

    fn create_index(&self, keys: &Value) -> Result<String>;

    fn create_document(&self, document: Value) -> Result<InsertOneResult>;

    fn create_documents(&self, documents: Vec<Value>) -> Result<InsertManyResult>;

    fn find_document(&self, query: &Value, projection: Option<&Value>) -> Result<Option<Value>>;

    fn find_documents(&self, query: &Value, projection: Option<&Value>) -> Result<Cursor>;

    fn update_document(&self, query: &Value, update: &Value) -> Result<UpdateResult>;

    fn update_documents(&self, query: &Value, update: &Value) -> Result<UpdateResult>;

    fn replace_document(&self, query: &Value, replacement: &Value, upsert: bool) -> Result<ReplaceResult>;

    fn delete_document(&self, query: &Value) -> Result<DeleteResult>;

    fn delete_documents(&self, query: &Value) -> Result<DeleteResult>;

    fn distinct(&self, field: &str, query: &Value) -> Result<Vec<Value>>;

    fn count_documents(&self, query: &Value) -> Result<u64>;

    fn aggregate(&self, pipeline: &Value) -> Result<Cursor>;

    fn bulk_write(&self, operations: &Value) -> Result<BulkWriteResult>;

    fn drop_collection(&self) -> Result<()>;
}

impl<S: Storage> DocumentCollection for CollectionCore<S> {
    fn collection_name(&self) -> &str {
        self.name()
    }

    fn create_index(&self, keys: &Value) -> Result<String> {
        CollectionCore::create_index(self, keys)
    }

    fn create_document(&self, document: Value) -> Result<InsertOneResult> {
        CollectionCore::create_document(self, document)
    }

    fn create_documents(&self, documents: Vec<Value>) -> Result<InsertManyResult> {
        CollectionCore::create_documents(self, documents)
    }

    fn find_document(&self, query: &Value, projection: Option<&Value>) -> Result<Option<Value>> {
        CollectionCore::find_document(self, query, projection)
    }

    fn find_documents(&self, query: &Value, projection: Option<&Value>) -> Result<Cursor> {
        CollectionCore::find_documents(self, query, projection)
    }

    fn update_document(&self, query: &Value, update: &Value) -> Result<UpdateResult> {
        CollectionCore::update_document(self, query, update)
    }

    fn update_documents(&self, query: &Value, update: &Value) -> Result<UpdateResult> {
        CollectionCore::update_documents(self, query, update)
    }

    fn replace_document(&self, query: &Value, replacement: &Value, upsert: bool) -> Result<ReplaceResult> {
        CollectionCore::replace_document(self, query, replacement, upsert)
    }

    fn delete_document(&self, query: &Value) -> Result<DeleteResult> {
        CollectionCore::delete_document(self, query)
    }

    fn delete_documents(&self, query: &Value) -> Result<DeleteResult> {
        CollectionCore::delete_documents(self, query)
    }

    fn distinct(&self, field: &str, query: &Value) -> Result<Vec<Value>> {
        CollectionCore::distinct(self, field, query)
    }

    fn count_documents(&self, query: &Value) -> Result<u64> {
        CollectionCore::count_documents(self, query)
    }

    fn aggregate(&self, pipeline: &Value) -> Result<Cursor> {
        CollectionCore::aggregate(self, pipeline)
    }

    fn bulk_write(&self, operations: &Value) -> Result<BulkWriteResult> {
        CollectionCore::bulk_write(self, operations)
    }

    fn drop_collection(&self) -> Result<()> {
        CollectionCore::drop_collection(self)
    }
}
