// docstore-core/src/collection_core/update.rs
//! Update specifications (`$set`) and whole-document replacements

use serde_json::{Map, Value};

use crate::document::{Document, DocumentId, ID_FIELD};
use crate::error::{DocStoreError, Result};

/// A validated `{ $set: { path: value, ... } }` update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    set: Vec<(String, Value)>,
}

impl UpdateSpec {
    pub fn parse(update: &Value) -> Result<Self> {
        let ops = update.as_object().ok_or_else(|| {
            DocStoreError::InvalidUpdate(format!("Update must be an object, got {}", update))
        })?;
        if ops.is_empty() {
            return Err(DocStoreError::InvalidUpdate(
                "Update document is empty".to_string(),
            ));
        }

        let mut set = Vec::new();
        for (op, fields) in ops {
            match op.as_str() {
                "$set" => {
                    let fields = fields.as_object().ok_or_else(|| {
                        DocStoreError::InvalidUpdate("$set requires an object".to_string())
                    })?;
                    for (path, value) in fields {
                        validate_set_path(path)?;
                        set.push((path.clone(), value.clone()));
                    }
                }
                other if other.starts_with('$') => {
                    return Err(DocStoreError::InvalidUpdate(format!(
                        "Unsupported update operator: {}",
                        other
                    )))
                }
                other => {
                    return Err(DocStoreError::InvalidUpdate(format!(
                        "Update must use operators, found plain field '{}' (use a replacement instead)",
                        other
                    )))
                }
            }
        }

        Ok(UpdateSpec { set })
    }

    /// Apply to a copy of `doc`; the stored document is never touched
    pub fn apply(&self, doc: &Document) -> Result<Document> {
        let mut updated = doc.clone();
        for (path, value) in &self.set {
            if !updated.set_nested(path, value.clone())? {
                return Err(DocStoreError::InvalidUpdate(format!(
                    "Cannot set '{}': a parent field is not an object",
                    path
                )));
            }
        }
        Ok(updated)
    }
}

fn validate_set_path(path: &str) -> Result<()> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(DocStoreError::InvalidUpdate(format!(
            "Invalid field path '{}'",
            path
        )));
    }
    if path == ID_FIELD || path.starts_with("_id.") {
        return Err(DocStoreError::InvalidUpdate(
            "The _id field is immutable".to_string(),
        ));
    }
    Ok(())
}

/// A validated replacement document (no operator keys)
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    body: Map<String, Value>,
}

impl Replacement {
    pub fn parse(replacement: &Value) -> Result<Self> {
        let body = replacement.as_object().ok_or_else(|| {
            DocStoreError::InvalidDocument(format!(
                "Replacement must be an object, got {}",
                replacement
            ))
        })?;
        if let Some(op) = body.keys().find(|k| k.starts_with('$')) {
            return Err(DocStoreError::InvalidUpdate(format!(
                "Replacement document cannot contain operator '{}'",
                op
            )));
        }
        Ok(Replacement { body: body.clone() })
    }

    /// `_id` carried by the replacement itself, if any
    pub fn explicit_id(&self) -> Result<Option<DocumentId>> {
        self.body
            .get(ID_FIELD)
            .map(DocumentId::from_value)
            .transpose()
    }

    /// Build the stored document for an existing `_id`
    ///
    /// `_id` comes first; a different `_id` in the replacement is rejected.
    pub fn for_id(&self, id: &DocumentId) -> Result<Document> {
        if let Some(own) = self.explicit_id()? {
            if &own != id {
                return Err(DocStoreError::InvalidUpdate(format!(
                    "Replacement _id {} does not match the matched document's _id {}",
                    own, id
                )));
            }
        }

        let mut body = Map::with_capacity(self.body.len() + 1);
        body.insert(ID_FIELD.to_string(), id.to_value());
        for (key, value) in &self.body {
            if key != ID_FIELD {
                body.insert(key.clone(), value.clone());
            }
        }
        Document::from_value(Value::Object(body))
    }

    /// Build a new document (upsert), generating an `_id` if needed
    pub fn into_new_document(self, fallback_id: Option<DocumentId>) -> Result<Document> {
        match (self.explicit_id()?, fallback_id) {
            (None, Some(id)) => self.for_id(&id),
            _ => Document::with_generated_id(Value::Object(self.body)),
        }
    }
}
