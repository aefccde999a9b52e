// src/query.rs
//! Query module for the MongoDB-like query language
//!
//! Filters are compiled once into a `Predicate` tree:
//! - `expression`: tagged field expressions (literal / operators / pattern)
//! - `operators`: the value matcher and the compiled-regex cache
//! - `predicate`: predicate nodes and their interpreter
//! - `compiler`: filter JSON -> predicate tree

pub mod compiler;
pub mod expression;
pub mod operators;
pub mod predicate;

use serde_json::Value;
use std::sync::Arc;

use crate::document::Document;
use crate::error::Result;
use crate::geo::{Geodesy, Haversine};

pub use compiler::QueryCompiler;
pub use expression::{OperatorClause, QueryExpr};
pub use operators::{matches_expr, set_regex_cache_capacity};
pub use predicate::{ElemMatchSpec, NearSphere, Predicate};

/// A filter together with its compiled predicate
///
/// # Examples
///
/// ```
/// use docstore_core::query::Query;
/// use serde_json::json;
///
/// let query = Query::from_json(&json!({"age": {"$gte": 18}})).unwrap();
/// assert!(query.matches_value(&json!({"age": 30})));
/// assert!(!query.matches_value(&json!({"age": 12})));
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    json: Value,
    predicate: Predicate,
}

impl Query {
    /// Empty query (matches all documents)
    pub fn new() -> Self {
        Query {
            json: Value::Object(Default::default()),
            predicate: Predicate::always(),
        }
    }

    /// Compile with the default haversine geodesy
    pub fn from_json(json: &Value) -> Result<Self> {
        Self::compile_with(json, Arc::new(Haversine))
    }

    pub fn compile_with(json: &Value, geodesy: Arc<dyn Geodesy>) -> Result<Self> {
        let predicate = QueryCompiler::new(geodesy).compile(json)?;
        Ok(Query {
            json: json.clone(),
            predicate,
        })
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.predicate.matches(document)
    }

    pub fn matches_value(&self, value: &Value) -> bool {
        self.predicate.evaluate(value)
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn to_json(&self) -> &Value {
        &self.json
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}
