// src/document.rs
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use uuid::Uuid;

use crate::error::{DocStoreError, Result};
use crate::value_utils::{get_nested_value, set_nested_value};

/// Reserved identifier field
pub const ID_FIELD: &str = "_id";

lazy_static! {
    /// 40 random bits fixed for the lifetime of the process
    static ref PROCESS_UNIQUE: u64 = {
        let bytes = Uuid::new_v4().into_bytes();
        bytes[..5].iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
    };

    /// 24-bit counter, seeded randomly so restarts don't replay sequences
    static ref ID_COUNTER: AtomicU32 = {
        let bytes = Uuid::new_v4().into_bytes();
        AtomicU32::new(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    };
}

/// Document ID types
/// Untagged so that ids appear as plain values inside documents: {"_id": 2}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum DocumentId {
    Int(i64),
    String(String),
}

impl DocumentId {
    /// Generate a new ObjectId-style identifier
    ///
    /// 24 lowercase hex characters: seconds since the epoch, a per-process
    /// random value, then an incrementing counter. Fixed-width hex keeps byte
    /// order equal to creation order within a process.
    pub fn new_object_id() -> Self {
        let seconds = chrono::Utc::now().timestamp() as u32;
        let counter = ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed) & 0x00ff_ffff;
        DocumentId::String(format!(
            "{:08x}{:010x}{:06x}",
            seconds, *PROCESS_UNIQUE, counter
        ))
    }

    /// Parse an `_id` value; only integral numbers and strings are accepted
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(DocumentId::String(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(DocumentId::Int(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                            Ok(DocumentId::Int(f as i64))
                        }
                        _ => Err(DocStoreError::InvalidDocument(format!(
                            "Invalid _id: {} is not an integer",
                            n
                        ))),
                    }
                }
            }
            other => Err(DocStoreError::InvalidDocument(format!(
                "Invalid _id: {} (expected an integer or a string)",
                other
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DocumentId::Int(i) => Value::from(*i),
            DocumentId::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Int(i) => write!(f, "{}", i),
            DocumentId::String(s) => write!(f, "{}", s),
        }
    }
}

/// Integers sort before strings; within a kind, natural ordering
impl Ord for DocumentId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DocumentId::Int(a), DocumentId::Int(b)) => a.cmp(b),
            (DocumentId::String(a), DocumentId::String(b)) => a.cmp(b),
            (DocumentId::Int(_), DocumentId::String(_)) => Ordering::Less,
            (DocumentId::String(_), DocumentId::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for DocumentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<i64> for DocumentId {
    fn from(id: i64) -> Self {
        DocumentId::Int(id)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        DocumentId::String(id.to_string())
    }
}

/// A stored document: an ordered JSON object whose `_id` is always present
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocumentId,
    body: Value,
}

impl Document {
    /// Wrap a JSON object that already carries a valid `_id`
    pub fn from_value(value: Value) -> Result<Self> {
        let map = match &value {
            Value::Object(map) => map,
            other => {
                return Err(DocStoreError::InvalidDocument(format!(
                    "Document must be an object, got {}",
                    other
                )))
            }
        };
        let id = map
            .get(ID_FIELD)
            .ok_or_else(|| DocStoreError::InvalidDocument("Document has no _id".to_string()))
            .and_then(DocumentId::from_value)?;
        Ok(Document { id, body: value })
    }

    /// Wrap a JSON object, generating an `_id` first if it has none
    ///
    /// A generated `_id` is placed first so documents read back like
    /// server-side inserts.
    pub fn with_generated_id(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) if !map.contains_key(ID_FIELD) => {
                let id = DocumentId::new_object_id();
                let mut body = Map::with_capacity(map.len() + 1);
                body.insert(ID_FIELD.to_string(), id.to_value());
                body.extend(map);
                Ok(Document {
                    id,
                    body: Value::Object(body),
                })
            }
            other => Self::from_value(other),
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Field lookup with dot notation (includes `_id`)
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_nested_value(&self.body, path)
    }

    pub fn as_value(&self) -> &Value {
        &self.body
    }

    pub fn into_value(self) -> Value {
        self.body
    }

    /// Set a field with dot notation; `_id` is immutable
    pub fn set_nested(&mut self, path: &str, value: Value) -> Result<bool> {
        if path == ID_FIELD || path.starts_with("_id.") {
            return Err(DocStoreError::InvalidUpdate(
                "The _id field is immutable".to_string(),
            ));
        }
        Ok(set_nested_value(&mut self.body, path, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_object_ids_are_unique_and_ordered() {
        let ids: Vec<DocumentId> = (0..1000).map(|_| DocumentId::new_object_id()).collect();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        for id in &ids {
            match id {
                DocumentId::String(s) => {
                    assert_eq!(s.len(), 24);
                    assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
                }
                other => panic!("expected a string id, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_document_id_from_value() {
        assert_eq!(DocumentId::from_value(&json!(5)).unwrap(), DocumentId::Int(5));
        assert_eq!(DocumentId::from_value(&json!(5.0)).unwrap(), DocumentId::Int(5));
        assert_eq!(
            DocumentId::from_value(&json!("abc")).unwrap(),
            DocumentId::String("abc".to_string())
        );
        assert!(DocumentId::from_value(&json!(1.5)).is_err());
        assert!(DocumentId::from_value(&json!({"a": 1})).is_err());
        assert!(DocumentId::from_value(&json!(null)).is_err());
    }

    #[test]
    fn test_document_id_ordering() {
        assert!(DocumentId::Int(2) < DocumentId::Int(10));
        assert!(DocumentId::Int(99) < DocumentId::from("a"));
        assert!(DocumentId::from("a") < DocumentId::from("b"));
    }

    #[test]
    fn test_with_generated_id_puts_id_first() {
        let doc = Document::with_generated_id(json!({"a": 1, "b": 2})).unwrap();
        let keys: Vec<&String> = doc.as_value().as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["_id", "a", "b"]);
        assert_eq!(doc.get("_id"), Some(&doc.id().to_value()));
    }

    #[test]
    fn test_with_generated_id_keeps_existing() {
        let doc = Document::with_generated_id(json!({"_id": 7, "a": 1})).unwrap();
        assert_eq!(doc.id(), &DocumentId::Int(7));
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Document::from_value(json!([1, 2])).is_err());
        assert!(Document::from_value(json!({"a": 1})).is_err());
    }

    #[test]
    fn test_set_nested_rejects_id() {
        let mut doc = Document::from_value(json!({"_id": 1, "a": {"b": 1}})).unwrap();
        assert!(doc.set_nested("_id", json!(2)).is_err());
        assert!(doc.set_nested("a.b", json!(3)).unwrap());
        assert_eq!(doc.get("a.b"), Some(&json!(3)));
    }
}
