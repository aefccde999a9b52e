// docstore-core/src/database.rs
// Named registry of collections over one shared store

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::info;

use crate::batch::batch_query;
use crate::collection_core::CollectionCore;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::geo::{Geodesy, Haversine};
use crate::query::set_regex_cache_capacity;
use crate::storage::{MemoryStorage, Storage};

/// A database: a name, a storage backend and the geodesy used by `$nearSphere`
///
/// Generic over Storage backend; `DatabaseCore<MemoryStorage>` is the
/// in-process database. Collections handed out share the same store, so a
/// document written through one handle is visible through every other.
pub struct DatabaseCore<S: Storage> {
    name: String,
    storage: Arc<RwLock<S>>,
    geodesy: Arc<dyn Geodesy>,
    default_batch_size: usize,
}

impl DatabaseCore<MemoryStorage> {
    /// Empty in-memory database with default settings
    pub fn in_memory(name: &str) -> Self {
        DatabaseCore::new(name, MemoryStorage::new())
    }

    /// In-memory database configured from a `StoreConfig`
    ///
    /// The regex cache capacity is process-wide; the last config applied wins.
    pub fn from_config(config: &StoreConfig) -> Self {
        set_regex_cache_capacity(config.regex_cache_capacity);
        let mut db = DatabaseCore::new(&config.database_name, MemoryStorage::new());
        db.default_batch_size = config.default_batch_size;
        db
    }
}

impl<S: Storage> DatabaseCore<S> {
    pub fn new(name: &str, storage: S) -> Self {
        DatabaseCore {
            name: name.to_string(),
            storage: Arc::new(RwLock::new(storage)),
            geodesy: Arc::new(Haversine),
            default_batch_size: StoreConfig::default().default_batch_size,
        }
    }

    /// Swap the distance function used by collections created afterwards
    pub fn with_geodesy(mut self, geodesy: Arc<dyn Geodesy>) -> Self {
        self.geodesy = geodesy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_batch_size(&self) -> usize {
        self.default_batch_size
    }

    /// Create a collection; creating an existing one returns a handle to it
    pub fn create_collection(&self, name: &str) -> Result<CollectionCore<S>> {
        let collection =
            CollectionCore::new(name.to_string(), Arc::clone(&self.storage), Arc::clone(&self.geodesy))?;
        info!(database = %self.name, collection = name, "collection ready");
        Ok(collection)
    }

    /// Get collection (creates if doesn't exist)
    pub fn collection(&self, name: &str) -> Result<CollectionCore<S>> {
        CollectionCore::new(name.to_string(), Arc::clone(&self.storage), Arc::clone(&self.geodesy))
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.storage.read().has_collection(name)
    }

    /// Collection names in creation order
    pub fn list_collection_names(&self) -> Vec<String> {
        self.storage.read().list_collections()
    }

    /// Remove every collection and its documents
    pub fn drop_database(&self) -> Result<()> {
        self.storage.write().drop_all()?;
        info!(database = %self.name, "dropped database");
        Ok(())
    }

    /// Batch protocol over a named collection
    ///
    /// `batch_size` falls back to the configured default when `None`.
    pub fn batch_query<F>(
        &self,
        collection: &str,
        query: &Value,
        batch_size: Option<usize>,
        handler: F,
    ) -> Result<usize>
    where
        F: FnMut(Vec<Value>, usize) -> Result<()>,
    {
        let collection = self.collection(collection)?;
        batch_query(
            &collection,
            query,
            batch_size.unwrap_or(self.default_batch_size),
            handler,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use serde_json::json;

    #[derive(Debug)]
    struct Flat;

    impl Geodesy for Flat {
        fn distance(&self, _a: &GeoPoint, _b: &GeoPoint) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_collections_share_store() {
        let db = DatabaseCore::in_memory("transport");
        let a = db.collection("stops").unwrap();
        a.create_document(json!({"_id": 1, "name": "Central"})).unwrap();

        let b = db.collection("stops").unwrap();
        assert_eq!(b.count_documents(&json!({})).unwrap(), 1);
        assert_eq!(db.name(), "transport");
    }

    #[test]
    fn test_create_collection_idempotent() {
        let db = DatabaseCore::in_memory("db");
        let first = db.create_collection("routes").unwrap();
        first.create_document(json!({"_id": "r1"})).unwrap();

        let second = db.create_collection("routes").unwrap();
        assert_eq!(second.count_documents(&json!({})).unwrap(), 1);
        assert_eq!(db.list_collection_names(), vec!["routes".to_string()]);
    }

    #[test]
    fn test_list_in_creation_order() {
        let db = DatabaseCore::in_memory("db");
        for name in ["trips", "agency", "stops"] {
            db.create_collection(name).unwrap();
        }
        assert_eq!(db.list_collection_names(), vec!["trips", "agency", "stops"]);
        assert!(db.has_collection("agency"));
        assert!(!db.has_collection("shapes"));
    }

    #[test]
    fn test_drop_database() {
        let db = DatabaseCore::in_memory("db");
        db.collection("a").unwrap().create_document(json!({"x": 1})).unwrap();
        db.collection("b").unwrap();

        db.drop_database().unwrap();
        assert!(db.list_collection_names().is_empty());
        assert_eq!(db.collection("a").unwrap().count_documents(&json!({})).unwrap(), 0);
    }

    #[test]
    fn test_from_config_batch_size() {
        let config = StoreConfig {
            database_name: "configured".to_string(),
            default_batch_size: 4,
            ..StoreConfig::default()
        };
        let db = DatabaseCore::from_config(&config);
        assert_eq!(db.name(), "configured");
        assert_eq!(db.default_batch_size(), 4);

        let coll = db.collection("items").unwrap();
        coll.create_documents((0..10).map(|i| json!({"_id": i})).collect()).unwrap();

        let mut sizes = Vec::new();
        let pages = db
            .batch_query("items", &json!({}), None, |page, _| {
                sizes.push(page.len());
                Ok(())
            })
            .unwrap();
        assert_eq!(pages, 3);
        assert_eq!(sizes, vec![4, 4, 2]);

        let pages = db.batch_query("items", &json!({}), Some(5), |_, _| Ok(())).unwrap();
        assert_eq!(pages, 2);
    }

    #[test]
    fn test_with_geodesy() {
        let db = DatabaseCore::in_memory("geo").with_geodesy(Arc::new(Flat));
        let coll = db.collection("stops").unwrap();
        coll.create_document(json!({"loc": {"type": "Point", "coordinates": [10.0, 10.0]}}))
            .unwrap();

        let query = json!({"loc": {"$nearSphere": {
            "$geometry": {"type": "Point", "coordinates": [-120.0, 40.0]},
            "$maxDistance": 1
        }}});
        assert_eq!(coll.count_documents(&query).unwrap(), 1);
    }
}
