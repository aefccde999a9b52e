//! Value utility functions shared across modules
//!
//! This module provides common functions for working with JSON values:
//! dot-path access and mutation, value equality, ordering, the JavaScript-style
//! string form used by the sort comparator, and a hashable canonical key used
//! for deduplication.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Get nested value from JSON with dot notation support
///
/// Supports:
/// - Simple fields: "name"
/// - Nested objects: "address.city"
/// - Array indexing: "items.0.name"
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use docstore_core::value_utils::get_nested_value;
///
/// let doc = json!({"address": {"city": "NYC"}});
/// assert_eq!(get_nested_value(&doc, "address.city"), Some(&json!("NYC")));
/// ```
pub fn get_nested_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    match lookup_path(doc, path) {
        PathLookup::Found(value) => Some(value),
        _ => None,
    }
}

/// Outcome of resolving a dot path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathLookup<'a> {
    Found(&'a Value),
    /// Every intermediate segment resolved, only the last one is absent
    MissingLeaf,
    /// An intermediate segment is absent or not traversable
    Unreachable,
}

/// Resolve a dot path, distinguishing an absent leaf from a broken path
///
/// `$elemMatch` needs the distinction: a missing leaf is an absent value (so
/// `$exists: false` can hold) while a missing intermediate fails the field.
pub fn lookup_path<'a>(doc: &'a Value, path: &str) -> PathLookup<'a> {
    if path.is_empty() {
        return PathLookup::Unreachable;
    }

    let parts: Vec<&str> = path.split('.').collect();
    let last = parts.len() - 1;
    let mut value = doc;

    for (i, part) in parts.iter().enumerate() {
        let next = match value {
            Value::Object(map) => map.get(*part),
            Value::Array(arr) => match part.parse::<usize>() {
                Ok(index) => arr.get(index),
                Err(_) => return PathLookup::Unreachable,
            },
            _ => return PathLookup::Unreachable,
        };

        match next {
            Some(v) => value = v,
            None if i == last => return PathLookup::MissingLeaf,
            None => return PathLookup::Unreachable,
        }
    }

    PathLookup::Found(value)
}

/// Set a value at a nested path with dot notation support
///
/// Creates intermediate objects if they don't exist. Returns `false` when an
/// intermediate segment holds a scalar and the value could not be placed.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use docstore_core::value_utils::set_nested_value;
///
/// let mut doc = json!({"name": "Alice"});
/// set_nested_value(&mut doc, "address.city", json!("NYC"));
/// assert_eq!(doc["address"]["city"], "NYC");
/// ```
pub fn set_nested_value(doc: &mut Value, path: &str, value: Value) -> bool {
    let (parent, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    };

    let mut current = doc;
    if let Some(parent) = parent {
        for part in parent.split('.') {
            current = match current {
                Value::Object(map) => map
                    .entry(part.to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(arr) => match part.parse::<usize>().ok().and_then(|i| arr.get_mut(i)) {
                    Some(next) => next,
                    None => return false,
                },
                _ => return false,
            };
        }
    }

    match current {
        Value::Object(map) => {
            map.insert(leaf.to_string(), value);
            true
        }
        Value::Array(arr) => match leaf.parse::<usize>() {
            Ok(index) if index < arr.len() => {
                arr[index] = value;
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Remove the value at a nested path, returning it if it existed
pub fn remove_nested_value(doc: &mut Value, path: &str) -> Option<Value> {
    match path.rsplit_once('.') {
        None => doc.as_object_mut()?.shift_remove(path),
        Some((parent, leaf)) => {
            let mut current = doc;
            for part in parent.split('.') {
                current = match current {
                    Value::Object(map) => map.get_mut(part)?,
                    Value::Array(arr) => arr.get_mut(part.parse::<usize>().ok()?)?,
                    _ => return None,
                };
            }
            current.as_object_mut()?.shift_remove(leaf)
        }
    }
}

/// Deep value equality where numbers compare by numeric value
///
/// `serde_json` keeps `1` and `1.0` as distinct representations; documents
/// arriving from different sources must still compare equal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => match (n1.as_f64(), n2.as_f64()) {
            (Some(f1), Some(f2)) => f1 == f2,
            _ => n1 == n2,
        },
        (Value::Array(a1), Value::Array(a2)) => {
            a1.len() == a2.len() && a1.iter().zip(a2).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(o1), Value::Object(o2)) => {
            o1.len() == o2.len()
                && o1
                    .iter()
                    .all(|(k, v)| o2.get(k).map(|w| values_equal(v, w)).unwrap_or(false))
        }
        _ => a == b,
    }
}

/// Compare two JSON values
///
/// Returns `Some(Ordering)` for comparable types (numbers, strings, booleans),
/// `None` for incompatible types (e.g., comparing string to number).
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use std::cmp::Ordering;
/// use docstore_core::value_utils::compare_values;
///
/// assert_eq!(compare_values(&json!(10), &json!(5)), Some(Ordering::Greater));
/// assert_eq!(compare_values(&json!("a"), &json!("b")), Some(Ordering::Less));
/// assert_eq!(compare_values(&json!("a"), &json!(1)), None); // incompatible
/// ```
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            let f1 = n1.as_f64()?;
            let f2 = n2.as_f64()?;
            f1.partial_cmp(&f2)
        }
        (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
        (Value::Bool(b1), Value::Bool(b2)) => Some(b1.cmp(b2)),
        _ => None,
    }
}

/// String form of a value as JavaScript's `toString` would render it
///
/// The sort comparator collates mixed-type keys by this form.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use docstore_core::value_utils::js_string;
///
/// assert_eq!(js_string(&json!(2.0)), "2");
/// assert_eq!(js_string(&json!([1, "a", null])), "1,a,");
/// ```
pub fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f == 0.0 => "0".to_string(),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
            (_, _, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(arr) => arr
            .iter()
            .map(|v| if v.is_null() { String::new() } else { js_string(v) })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Hashable, order-sensitive canonical form of a JSON value
///
/// Used as a dedup key (`$group`, `$sortByCount`, `distinct`) in place of a
/// serialized string. Numbers are keyed by their `f64` bit pattern with `-0.0`
/// folded into `0.0`, so `1` and `1.0` collapse into one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Number(u64),
    /// Non-finite or out-of-range numbers keyed by their textual form
    RawNumber(String),
    String(String),
    Array(Vec<CanonicalValue>),
    Object(Vec<(String, CanonicalValue)>),
}

impl CanonicalValue {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => CanonicalValue::Null,
            Value::Bool(b) => CanonicalValue::Bool(*b),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f == 0.0 => CanonicalValue::Number(0f64.to_bits()),
                Some(f) if f.is_finite() => CanonicalValue::Number(f.to_bits()),
                _ => CanonicalValue::RawNumber(n.to_string()),
            },
            Value::String(s) => CanonicalValue::String(s.clone()),
            Value::Array(arr) => {
                CanonicalValue::Array(arr.iter().map(CanonicalValue::from_value).collect())
            }
            Value::Object(map) => CanonicalValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), CanonicalValue::from_value(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested_value_simple() {
        let doc = json!({"name": "Alice", "age": 30});
        assert_eq!(get_nested_value(&doc, "name"), Some(&json!("Alice")));
        assert_eq!(get_nested_value(&doc, "age"), Some(&json!(30)));
        assert_eq!(get_nested_value(&doc, "missing"), None);
    }

    #[test]
    fn test_get_nested_value_nested() {
        let doc = json!({
            "address": {
                "city": "NYC",
                "zip": 10001
            }
        });
        assert_eq!(get_nested_value(&doc, "address.city"), Some(&json!("NYC")));
        assert_eq!(get_nested_value(&doc, "address.zip"), Some(&json!(10001)));
        assert_eq!(get_nested_value(&doc, "address.missing"), None);
    }

    #[test]
    fn test_get_nested_value_array_index() {
        let doc = json!({
            "items": [
                {"name": "item1"},
                {"name": "item2"}
            ]
        });
        assert_eq!(get_nested_value(&doc, "items.0.name"), Some(&json!("item1")));
        assert_eq!(get_nested_value(&doc, "items.1.name"), Some(&json!("item2")));
        assert_eq!(get_nested_value(&doc, "items.5.name"), None);
    }

    #[test]
    fn test_lookup_path_distinguishes_missing_leaf() {
        let doc = json!({"sub": {"tram": true}, "flat": 1});
        assert_eq!(lookup_path(&doc, "sub.tram"), PathLookup::Found(&json!(true)));
        assert_eq!(lookup_path(&doc, "sub.bus"), PathLookup::MissingLeaf);
        assert_eq!(lookup_path(&doc, "nope.bus"), PathLookup::Unreachable);
        assert_eq!(lookup_path(&doc, "flat.bus"), PathLookup::Unreachable);
        assert_eq!(lookup_path(&doc, ""), PathLookup::Unreachable);
    }

    #[test]
    fn test_set_nested_value_create() {
        let mut doc = json!({"name": "Alice"});
        assert!(set_nested_value(&mut doc, "address.city", json!("NYC")));
        assert_eq!(doc["address"]["city"], "NYC");
    }

    #[test]
    fn test_set_nested_value_overwrite() {
        let mut doc = json!({"address": {"city": "NYC"}});
        assert!(set_nested_value(&mut doc, "address.city", json!("Boston")));
        assert_eq!(doc["address"]["city"], "Boston");
    }

    #[test]
    fn test_set_nested_value_through_scalar_fails() {
        let mut doc = json!({"name": "Alice"});
        assert!(!set_nested_value(&mut doc, "name.first", json!("A")));
        assert_eq!(doc["name"], "Alice");
    }

    #[test]
    fn test_set_nested_value_array_index() {
        let mut doc = json!({"items": [{"n": 1}, {"n": 2}]});
        assert!(set_nested_value(&mut doc, "items.1.n", json!(5)));
        assert_eq!(doc["items"][1]["n"], 5);
        assert!(!set_nested_value(&mut doc, "items.9.n", json!(5)));
    }

    #[test]
    fn test_remove_nested_value() {
        let mut doc = json!({"a": 1, "b": {"c": 2, "d": 3}});
        assert_eq!(remove_nested_value(&mut doc, "b.c"), Some(json!(2)));
        assert_eq!(remove_nested_value(&mut doc, "a"), Some(json!(1)));
        assert_eq!(remove_nested_value(&mut doc, "x.y"), None);
        assert_eq!(doc, json!({"b": {"d": 3}}));
    }

    #[test]
    fn test_values_equal_numeric_representations() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!([1, {"a": 2.0}]), &json!([1.0, {"a": 2}])));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!values_equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&json!(10), &json!(5)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(3.5), &json!(2.5)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!("apple"), &json!("banana")), Some(Ordering::Less));
        assert_eq!(compare_values(&json!(false), &json!(true)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("string"), &json!(42)), None);
        assert_eq!(compare_values(&json!([1, 2]), &json!(1)), None);
    }

    #[test]
    fn test_js_string() {
        assert_eq!(js_string(&json!(3)), "3");
        assert_eq!(js_string(&json!(1.5)), "1.5");
        assert_eq!(js_string(&json!(1e20)), "100000000000000000000");
        assert_eq!(js_string(&json!(-3.0)), "-3");
        assert_eq!(js_string(&json!(-0.0)), "0");
        assert_eq!(js_string(&json!(true)), "true");
        assert_eq!(js_string(&json!(null)), "null");
        assert_eq!(js_string(&json!({"a": 1})), "[object Object]");
    }

    #[test]
    fn test_canonical_value_is_order_sensitive() {
        let v1 = CanonicalValue::from_value(&json!({"a": 1, "b": 2}));
        let v2 = CanonicalValue::from_value(&json!({"b": 2, "a": 1}));
        assert_ne!(v1, v2);
    }

    #[test]
    fn test_canonical_value_numbers() {
        assert_eq!(
            CanonicalValue::from_value(&json!(1)),
            CanonicalValue::from_value(&json!(1.0))
        );
        assert_eq!(
            CanonicalValue::from_value(&json!(0.0)),
            CanonicalValue::from_value(&json!(-0.0))
        );
        assert_ne!(
            CanonicalValue::from_value(&json!("1")),
            CanonicalValue::from_value(&json!(1))
        );
    }
}
