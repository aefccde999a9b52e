// docstore-core/src/lib.rs
// In-process document store with a MongoDB-style query surface

pub mod aggregation;
pub mod batch;
pub mod collection_api;
pub mod collection_core;
pub mod config;
pub mod cursor;
pub mod database;
pub mod document;
pub mod error;
pub mod find_options;
pub mod geo;
pub mod logging;
pub mod query;
pub mod storage;
pub mod value_utils;

// Public exports
pub use aggregation::Pipeline;
pub use batch::{batch_query, batch_query_with, BatchOptions};
pub use collection_api::DocumentCollection;
pub use collection_core::{
    BulkWriteResult, CollectionCore, DeleteResult, InsertManyResult, InsertOneResult,
    ReplaceResult, UpdateResult,
};
pub use config::StoreConfig;
pub use cursor::Cursor;
pub use database::DatabaseCore;
pub use document::{Document, DocumentId};
pub use error::{DocStoreError, Result};
pub use find_options::{Projection, SortDirection, SortSpec};
pub use geo::{GeoPoint, Geodesy, Haversine};
pub use logging::{init_logging, LogLevel};
pub use query::{Predicate, Query, QueryCompiler};
pub use storage::{MemoryStorage, Storage};
