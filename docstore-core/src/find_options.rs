// docstore-core/src/find_options.rs
// Find query options: projection and sort

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed, CollatorPreferences};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::document::ID_FIELD;
use crate::error::{DocStoreError, Result};
use crate::value_utils::{get_nested_value, js_string, remove_nested_value, set_nested_value};

// ============================================================================
// PROJECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    Include,
    Exclude,
}

/// A validated projection: field → 1 (include) or 0 (exclude)
///
/// Non-`_id` fields must all share one mode. `_id` is kept in include mode
/// unless explicitly excluded, and may be excluded in either mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    mode: ProjectionMode,
    fields: Vec<String>,
    include_id: bool,
}

impl Projection {
    /// Parse a projection document; an empty (or `null`) spec means "no projection"
    pub fn parse(spec: &Value) -> Result<Option<Projection>> {
        let obj = match spec {
            Value::Null => return Ok(None),
            Value::Object(obj) if obj.is_empty() => return Ok(None),
            Value::Object(obj) => obj,
            other => {
                return Err(DocStoreError::InvalidProjection(format!(
                    "Projection must be an object, got {}",
                    other
                )))
            }
        };

        let mut id_flag = None;
        let mut mode_flag = None;
        let mut fields = Vec::with_capacity(obj.len());

        for (field, value) in obj {
            let flag = projection_flag(field, value)?;
            if field == ID_FIELD {
                id_flag = Some(flag);
                continue;
            }
            match mode_flag {
                None => mode_flag = Some(flag),
                Some(first) if first != flag => {
                    return Err(DocStoreError::InvalidProjection(format!(
                        "Cannot mix inclusion and exclusion in projection (field '{}')",
                        field
                    )))
                }
                Some(_) => {}
            }
            fields.push(field.clone());
        }

        let projection = match (mode_flag, id_flag) {
            (Some(true), id) => Projection {
                mode: ProjectionMode::Include,
                fields,
                include_id: id.unwrap_or(true),
            },
            (Some(false), id) => {
                if id == Some(false) {
                    fields.push(ID_FIELD.to_string());
                }
                Projection {
                    mode: ProjectionMode::Exclude,
                    fields,
                    include_id: id != Some(false),
                }
            }
            // Only `_id` was given
            (None, Some(false)) => Projection {
                mode: ProjectionMode::Exclude,
                fields: vec![ID_FIELD.to_string()],
                include_id: false,
            },
            (None, _) => Projection {
                mode: ProjectionMode::Include,
                fields,
                include_id: true,
            },
        };
        Ok(Some(projection))
    }

    pub fn mode(&self) -> ProjectionMode {
        self.mode
    }

    pub fn includes_id(&self) -> bool {
        self.include_id
    }

    /// Apply to one document, returning a new value
    ///
    /// Dot paths are supported on both sides: inclusion rebuilds the nested
    /// objects, exclusion removes the nested leaf.
    pub fn apply(&self, doc: &Value) -> Value {
        if !doc.is_object() {
            return doc.clone();
        }

        match self.mode {
            ProjectionMode::Include => {
                let mut result = Value::Object(Map::new());
                if self.include_id {
                    if let Some(id) = doc.get(ID_FIELD) {
                        set_nested_value(&mut result, ID_FIELD, id.clone());
                    }
                }
                for field in &self.fields {
                    if let Some(value) = get_nested_value(doc, field) {
                        set_nested_value(&mut result, field, value.clone());
                    }
                }
                result
            }
            ProjectionMode::Exclude => {
                let mut result = doc.clone();
                for field in &self.fields {
                    remove_nested_value(&mut result, field);
                }
                result
            }
        }
    }
}

fn projection_flag(field: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) => Ok(f != 0.0),
            None => Ok(true),
        },
        other => Err(DocStoreError::InvalidProjection(format!(
            "Projection value for '{}' must be 0/1 or a boolean, got {}",
            field, other
        ))),
    }
}

/// Apply an optional projection
pub fn apply_projection(doc: &Value, projection: Option<&Projection>) -> Value {
    match projection {
        Some(p) => p.apply(doc),
        None => doc.clone(),
    }
}

// ============================================================================
// SORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Ordered sort keys: [(field, direction)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    keys: Vec<(String, SortDirection)>,
}

impl SortSpec {
    /// Parse `{field: 1 | -1, ...}` keeping key order
    pub fn parse(spec: &Value) -> Result<SortSpec> {
        let obj = spec.as_object().ok_or_else(|| {
            DocStoreError::InvalidQuery(format!("Sort specification must be an object, got {}", spec))
        })?;

        let keys = obj
            .iter()
            .map(|(field, direction)| {
                let direction = match direction.as_f64() {
                    Some(d) if d == 1.0 => SortDirection::Ascending,
                    Some(d) if d == -1.0 => SortDirection::Descending,
                    _ => {
                        return Err(DocStoreError::InvalidQuery(format!(
                            "Invalid sort direction for '{}': {} (expected 1 or -1)",
                            field, direction
                        )))
                    }
                };
                Ok((field.clone(), direction))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SortSpec { keys })
    }

    /// Single ascending key
    pub fn ascending(field: &str) -> SortSpec {
        SortSpec {
            keys: vec![(field.to_string(), SortDirection::Ascending)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }
}

/// Sort documents in place (stable)
///
/// Per key: numbers compare numerically, other present values are collated
/// (ICU root locale) by their JavaScript string form, and a missing value
/// compares greater than a present one. The key's direction is applied to
/// the result, so a descending key puts missing values first.
pub fn apply_sort(docs: &mut [Value], sort: &SortSpec) -> Result<()> {
    if sort.is_empty() || docs.len() < 2 {
        return Ok(());
    }

    let collator = Collator::try_new(CollatorPreferences::default(), CollatorOptions::default())
        .map_err(|_| {
            DocStoreError::Storage("Failed to create collator for sorting".to_string())
        })?;

    docs.sort_by(|a, b| compare_documents(&collator, a, b, sort));
    Ok(())
}

fn compare_documents(collator: &CollatorBorrowed, a: &Value, b: &Value, sort: &SortSpec) -> Ordering {
    for (field, direction) in sort.keys() {
        let cmp = compare_sort_values(
            collator,
            get_nested_value(a, field),
            get_nested_value(b, field),
        );
        if cmp != Ordering::Equal {
            return direction.apply(cmp);
        }
    }
    Ordering::Equal
}

fn compare_sort_values(collator: &CollatorBorrowed, a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(n1)), Some(Value::Number(n2))) => {
            match (n1.as_f64(), n2.as_f64()) {
                (Some(f1), Some(f2)) => f1.partial_cmp(&f2).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            }
        }
        (Some(a_val), Some(b_val)) => collator.compare(&js_string(a_val), &js_string(b_val)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project(doc: Value, spec: Value) -> Value {
        Projection::parse(&spec).unwrap().unwrap().apply(&doc)
    }

    #[test]
    fn test_projection_empty_is_none() {
        assert!(Projection::parse(&json!({})).unwrap().is_none());
        assert!(Projection::parse(&Value::Null).unwrap().is_none());
    }

    #[test]
    fn test_projection_include_mode() {
        let doc = json!({"_id": 1, "name": "Alice", "age": 30, "city": "NYC"});
        let result = project(doc, json!({"name": 1, "age": 1}));
        assert_eq!(result, json!({"_id": 1, "name": "Alice", "age": 30}));
    }

    #[test]
    fn test_projection_exclude_id_with_inclusions() {
        let doc = json!({"_id": 1, "name": "Alice", "age": 30});
        let result = project(doc, json!({"name": true, "_id": false}));
        assert_eq!(result, json!({"name": "Alice"}));
    }

    #[test]
    fn test_projection_exclude_mode() {
        let doc = json!({"_id": 1, "name": "Alice", "age": 30, "city": "NYC"});
        let result = project(doc, json!({"city": 0}));
        assert_eq!(result, json!({"_id": 1, "name": "Alice", "age": 30}));
    }

    #[test]
    fn test_projection_only_id_excluded() {
        let doc = json!({"_id": 1, "name": "Hi"});
        assert_eq!(project(doc, json!({"_id": false})), json!({"name": "Hi"}));
    }

    #[test]
    fn test_projection_dot_paths() {
        let doc = json!({"_id": 1, "address": {"city": "NYC", "zip": "10001"}, "n": 1});
        assert_eq!(
            project(doc.clone(), json!({"address.city": 1, "_id": 0})),
            json!({"address": {"city": "NYC"}})
        );
        assert_eq!(
            project(doc, json!({"address.zip": 0})),
            json!({"_id": 1, "address": {"city": "NYC"}, "n": 1})
        );
    }

    #[test]
    fn test_projection_mixed_is_error() {
        let err = Projection::parse(&json!({"a": 1, "b": 0})).unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidProjection(_)));
        assert!(Projection::parse(&json!({"a": "yes"})).is_err());
        assert!(Projection::parse(&json!([1])).is_err());
    }

    #[test]
    fn test_sort_single_field() {
        let mut docs = vec![json!({"age": 30}), json!({"age": 25}), json!({"age": 35})];
        apply_sort(&mut docs, &SortSpec::parse(&json!({"age": 1})).unwrap()).unwrap();
        assert_eq!(docs, vec![json!({"age": 25}), json!({"age": 30}), json!({"age": 35})]);
    }

    #[test]
    fn test_sort_descending() {
        let mut docs = vec![json!({"age": 30}), json!({"age": 25}), json!({"age": 35})];
        apply_sort(&mut docs, &SortSpec::parse(&json!({"age": -1})).unwrap()).unwrap();
        assert_eq!(docs, vec![json!({"age": 35}), json!({"age": 30}), json!({"age": 25})]);
    }

    #[test]
    fn test_sort_multi_field() {
        let mut docs = vec![
            json!({"n": 3, "m": 0}),
            json!({"n": 2, "m": 3}),
            json!({"n": 2, "m": 1}),
            json!({"n": 2, "m": 2}),
            json!({"n": 1, "m": -1}),
        ];
        apply_sort(&mut docs, &SortSpec::parse(&json!({"n": 1, "m": -1})).unwrap()).unwrap();
        let order: Vec<(i64, i64)> = docs
            .iter()
            .map(|d| (d["n"].as_i64().unwrap(), d["m"].as_i64().unwrap()))
            .collect();
        assert_eq!(order, vec![(1, -1), (2, 3), (2, 2), (2, 1), (3, 0)]);
    }

    #[test]
    fn test_sort_missing_values() {
        let mut docs = vec![json!({"id": 1}), json!({"id": 2, "v": 5}), json!({"id": 3, "v": 1})];
        apply_sort(&mut docs, &SortSpec::parse(&json!({"v": 1})).unwrap()).unwrap();
        assert_eq!(docs[2]["id"], 1);

        apply_sort(&mut docs, &SortSpec::parse(&json!({"v": -1})).unwrap()).unwrap();
        assert_eq!(docs[0]["id"], 1);
    }

    #[test]
    fn test_sort_strings_collated() {
        let mut docs = vec![json!({"s": "b"}), json!({"s": "B"}), json!({"s": "a"})];
        apply_sort(&mut docs, &SortSpec::parse(&json!({"s": 1})).unwrap()).unwrap();
        assert_eq!(docs[0]["s"], "a");
    }

    #[test]
    fn test_sort_is_stable() {
        let mut docs = vec![
            json!({"k": 1, "seq": 0}),
            json!({"k": 0, "seq": 1}),
            json!({"k": 1, "seq": 2}),
            json!({"k": 0, "seq": 3}),
        ];
        apply_sort(&mut docs, &SortSpec::ascending("k")).unwrap();
        let seq: Vec<i64> = docs.iter().map(|d| d["seq"].as_i64().unwrap()).collect();
        assert_eq!(seq, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_sort_invalid_direction() {
        assert!(SortSpec::parse(&json!({"a": 2})).is_err());
        assert!(SortSpec::parse(&json!({"a": "asc"})).is_err());
        assert!(SortSpec::parse(&json!([["a", 1]])).is_err());
    }
}
