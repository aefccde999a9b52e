// docstore-core/src/collection_core/bulk.rs
//! Bulk write models
//!
//! Every operation of a batch is parsed (and its filter compiled) before the
//! first one is applied, so a malformed batch leaves the collection untouched.
//! Execution itself is sequential and not atomic.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::update::{Replacement, UpdateSpec};
use crate::document::DocumentId;
use crate::error::{DocStoreError, Result};
use crate::query::{Predicate, QueryCompiler};

/// A filter kept alongside its compiled predicate
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub json: Value,
    pub predicate: Predicate,
}

impl CompiledFilter {
    pub fn compile(json: &Value, compiler: &QueryCompiler) -> Result<Self> {
        Ok(CompiledFilter {
            json: json.clone(),
            predicate: compiler.compile(json)?,
        })
    }
}

/// One parsed bulk operation
#[derive(Debug, Clone)]
pub enum WriteModel {
    InsertOne {
        document: Value,
    },
    UpdateOne {
        filter: CompiledFilter,
        update: UpdateSpec,
    },
    UpdateMany {
        filter: CompiledFilter,
        update: UpdateSpec,
    },
    ReplaceOne {
        filter: CompiledFilter,
        replacement: Replacement,
        upsert: bool,
    },
    DeleteOne {
        filter: CompiledFilter,
    },
    DeleteMany {
        filter: CompiledFilter,
    },
}

fn bulk_error(message: String) -> DocStoreError {
    DocStoreError::InvalidQuery(message)
}

fn required<'a>(args: &'a Value, op: &str, field: &str) -> Result<&'a Value> {
    args.get(field)
        .ok_or_else(|| bulk_error(format!("{} requires '{}'", op, field)))
}

impl WriteModel {
    /// Parse `{ <opName>: { ...args } }`
    pub fn parse(op: &Value, compiler: &QueryCompiler) -> Result<Self> {
        let obj = op
            .as_object()
            .filter(|obj| obj.len() == 1)
            .ok_or_else(|| {
                bulk_error(format!(
                    "Bulk operation must be a single-key object, got {}",
                    op
                ))
            })?;
        let (name, args) = match obj.iter().next() {
            Some(entry) => entry,
            None => return Err(bulk_error("Empty bulk operation".to_string())),
        };
        if !args.is_object() {
            return Err(bulk_error(format!("{} arguments must be an object", name)));
        }

        let filter = |field: &str| -> Result<CompiledFilter> {
            CompiledFilter::compile(required(args, name, field)?, compiler)
        };

        let model = match name.as_str() {
            "insertOne" => {
                // { insertOne: { document: {...} } } or the bare document
                let document = match args.get("document") {
                    Some(doc) if args.as_object().map(|a| a.len()) == Some(1) => doc.clone(),
                    _ => args.clone(),
                };
                if !document.is_object() {
                    return Err(DocStoreError::InvalidDocument(
                        "insertOne document must be an object".to_string(),
                    ));
                }
                WriteModel::InsertOne { document }
            }
            "updateOne" => WriteModel::UpdateOne {
                filter: filter("filter")?,
                update: UpdateSpec::parse(required(args, name, "update")?)?,
            },
            "updateMany" => WriteModel::UpdateMany {
                filter: filter("filter")?,
                update: UpdateSpec::parse(required(args, name, "update")?)?,
            },
            "replaceOne" => WriteModel::ReplaceOne {
                filter: filter("filter")?,
                replacement: Replacement::parse(required(args, name, "replacement")?)?,
                upsert: args.get("upsert").and_then(Value::as_bool).unwrap_or(false),
            },
            "deleteOne" => WriteModel::DeleteOne {
                filter: filter("filter")?,
            },
            "deleteMany" => WriteModel::DeleteMany {
                filter: filter("filter")?,
            },
            other => return Err(bulk_error(format!("Unknown bulk operation: {}", other))),
        };
        Ok(model)
    }

    /// Parse a whole batch (an array of operations)
    pub fn parse_all(ops: &Value, compiler: &QueryCompiler) -> Result<Vec<Self>> {
        ops.as_array()
            .ok_or_else(|| bulk_error("bulkWrite requires an array of operations".to_string()))?
            .iter()
            .map(|op| WriteModel::parse(op, compiler))
            .collect()
    }
}

/// Aggregate outcome of a bulk write
///
/// `inserted_ids` / `upserted_ids` are keyed by the operation's index in the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkWriteResult {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub upserted_count: u64,
    pub inserted_ids: IndexMap<usize, DocumentId>,
    pub upserted_ids: IndexMap<usize, DocumentId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Haversine;
    use serde_json::json;
    use std::sync::Arc;

    fn compiler() -> QueryCompiler {
        QueryCompiler::new(Arc::new(Haversine))
    }

    #[test]
    fn test_insert_one_forms() {
        let bare = WriteModel::parse(&json!({"insertOne": {"name": "Hi"}}), &compiler()).unwrap();
        assert!(matches!(bare, WriteModel::InsertOne { document } if document == json!({"name": "Hi"})));

        let wrapped =
            WriteModel::parse(&json!({"insertOne": {"document": {"name": "Hi"}}}), &compiler())
                .unwrap();
        assert!(matches!(wrapped, WriteModel::InsertOne { document } if document == json!({"name": "Hi"})));
    }

    #[test]
    fn test_update_and_replace_models() {
        let update = WriteModel::parse(
            &json!({"updateOne": {"filter": {"id": 2}, "update": {"$set": {"name": "Test"}}}}),
            &compiler(),
        )
        .unwrap();
        assert!(matches!(update, WriteModel::UpdateOne { .. }));

        let replace = WriteModel::parse(
            &json!({"replaceOne": {"filter": {"id": 2}, "replacement": {"x": 1}, "upsert": true}}),
            &compiler(),
        )
        .unwrap();
        assert!(matches!(replace, WriteModel::ReplaceOne { upsert: true, .. }));
    }

    #[test]
    fn test_parse_errors() {
        let c = compiler();
        assert!(WriteModel::parse(&json!({"insertOne": {}, "deleteOne": {}}), &c).is_err());
        assert!(WriteModel::parse(&json!({"upsertOne": {}}), &c).is_err());
        assert!(WriteModel::parse(&json!({"updateOne": {"filter": {}}}), &c).is_err());
        assert!(WriteModel::parse(&json!({"updateOne": {"filter": {}, "update": {"$inc": {"a": 1}}}}), &c).is_err());
        assert!(WriteModel::parse(&json!({"deleteOne": {"filter": {"$bad": 1}}}), &c).is_err());
        assert!(WriteModel::parse(&json!({"deleteMany": 5}), &c).is_err());
        assert!(WriteModel::parse_all(&json!({"insertOne": {}}), &c).is_err());
    }

    #[test]
    fn test_parse_all_stops_on_first_bad_op() {
        let ops = json!([
            {"insertOne": {"a": 1}},
            {"deleteOne": {}}
        ]);
        assert!(WriteModel::parse_all(&ops, &compiler()).is_err());
    }
}
