// src/query/compiler.rs
//! Query Compiler: filter JSON -> `Predicate`

use serde_json::{Map, Value};
use std::sync::Arc;

use super::expression::{parse_pattern, QueryExpr};
use super::predicate::{ElemMatchSpec, NearSphere, Predicate};
use crate::error::{DocStoreError, Result};
use crate::geo::{GeoPoint, Geodesy, Geometry};

/// Compiles filter documents against a fixed geodesy provider
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    geodesy: Arc<dyn Geodesy>,
}

impl QueryCompiler {
    pub fn new(geodesy: Arc<dyn Geodesy>) -> Self {
        QueryCompiler { geodesy }
    }

    /// Compile a filter document
    ///
    /// `null` is accepted as the empty filter.
    pub fn compile(&self, query: &Value) -> Result<Predicate> {
        let obj = match query {
            Value::Object(obj) => obj,
            Value::Null => return Ok(Predicate::always()),
            other => {
                return Err(DocStoreError::InvalidQuery(format!(
                    "Query must be an object, got {}",
                    other
                )))
            }
        };

        let mut clauses = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            let clause = match key.as_str() {
                "$and" => Predicate::And(self.compile_branches("$and", value)?),
                "$or" => Predicate::Or(self.compile_branches("$or", value)?),
                op if op.starts_with('$') => {
                    return Err(DocStoreError::InvalidQuery(format!(
                        "Unknown top-level operator: {}",
                        op
                    )))
                }
                path => self.compile_field(path, value)?,
            };
            clauses.push(clause);
        }

        if clauses.len() == 1 {
            if let Some(only) = clauses.pop() {
                return Ok(only);
            }
        }
        Ok(Predicate::And(clauses))
    }

    fn compile_branches(&self, op: &str, value: &Value) -> Result<Vec<Predicate>> {
        let branches = value.as_array().ok_or_else(|| {
            DocStoreError::InvalidQuery(format!("{} operator requires an array", op))
        })?;
        branches
            .iter()
            .map(|branch| {
                if !branch.is_object() {
                    return Err(DocStoreError::InvalidQuery(format!(
                        "{} array entries must be objects",
                        op
                    )));
                }
                self.compile(branch)
            })
            .collect()
    }

    fn compile_field(&self, path: &str, value: &Value) -> Result<Predicate> {
        if let Value::Object(obj) = value {
            if let Some(payload) = obj.get("$nearSphere") {
                return self.compile_near_sphere(path, payload, obj);
            }
            if let Some(payload) = obj.get("$elemMatch") {
                return compile_elem_match(path, payload);
            }
            if let Some(pattern) = obj.get("$regex") {
                return Ok(Predicate::Regex {
                    path: path.to_string(),
                    pattern: parse_pattern(pattern, obj.get("$options"))?,
                });
            }
        }

        Ok(Predicate::Field {
            path: path.to_string(),
            expr: QueryExpr::parse(value)?,
        })
    }

    fn compile_near_sphere(
        &self,
        path: &str,
        payload: &Value,
        siblings: &Map<String, Value>,
    ) -> Result<Predicate> {
        let (center, inner_max) = match payload {
            Value::Object(inner) => {
                let geometry = inner.get("$geometry").ok_or_else(|| {
                    DocStoreError::InvalidQuery("$nearSphere requires $geometry".to_string())
                })?;
                let center = match Geometry::from_value(geometry) {
                    Some(Geometry::Point(point)) => point,
                    _ => {
                        return Err(DocStoreError::InvalidQuery(
                            "$nearSphere $geometry must be a GeoJSON Point".to_string(),
                        ))
                    }
                };
                (center, inner.get("$maxDistance"))
            }
            legacy => {
                let center = GeoPoint::from_coordinates(legacy).ok_or_else(|| {
                    DocStoreError::InvalidQuery(
                        "$nearSphere requires $geometry or a [lng, lat] pair".to_string(),
                    )
                })?;
                (center, None)
            }
        };

        let max_distance_m = match inner_max.or_else(|| siblings.get("$maxDistance")) {
            None => f64::INFINITY,
            Some(value) => match value.as_f64() {
                Some(m) if m >= 0.0 => m,
                _ => {
                    return Err(DocStoreError::InvalidQuery(
                        "$maxDistance must be a non-negative number".to_string(),
                    ))
                }
            },
        };

        Ok(Predicate::NearSphere(NearSphere {
            path: path.to_string(),
            center,
            max_distance_m,
            geodesy: Arc::clone(&self.geodesy),
        }))
    }
}

fn compile_elem_match(path: &str, payload: &Value) -> Result<Predicate> {
    let obj = payload.as_object().ok_or_else(|| {
        DocStoreError::InvalidQuery("$elemMatch requires an object".to_string())
    })?;

    let mut spec = ElemMatchSpec::default();
    for (key, value) in obj {
        if key == "$or" {
            let alternatives = value.as_array().ok_or_else(|| {
                DocStoreError::InvalidQuery("$elemMatch $or requires an array".to_string())
            })?;
            spec.any_of = Some(
                alternatives
                    .iter()
                    .map(compile_alternative)
                    .collect::<Result<Vec<_>>>()?,
            );
        } else if !key.starts_with('$') {
            spec.fields.push((key.clone(), QueryExpr::parse_static(value)?));
        }
    }

    Ok(Predicate::ElemMatch {
        path: path.to_string(),
        spec,
    })
}

fn compile_alternative(alternative: &Value) -> Result<Vec<(String, QueryExpr)>> {
    let obj = alternative.as_object().ok_or_else(|| {
        DocStoreError::InvalidQuery("$elemMatch $or entries must be objects".to_string())
    })?;
    obj.iter()
        .filter(|(key, _)| !key.starts_with('$'))
        .map(|(key, value)| -> Result<(String, QueryExpr)> {
            Ok((key.clone(), QueryExpr::parse(value)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Haversine;
    use serde_json::json;

    fn compile(query: Value) -> Result<Predicate> {
        QueryCompiler::new(Arc::new(Haversine)).compile(&query)
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(compile(json!({})).unwrap().evaluate(&json!({"a": 1})));
        assert!(compile(Value::Null).unwrap().evaluate(&json!({"a": 1})));
    }

    #[test]
    fn test_field_and_logical() {
        let pred = compile(json!({
            "city": "NYC",
            "$or": [{"age": {"$lt": 20}}, {"age": {"$gt": 60}}]
        }))
        .unwrap();
        assert!(pred.evaluate(&json!({"city": "NYC", "age": 70})));
        assert!(!pred.evaluate(&json!({"city": "NYC", "age": 40})));
        assert!(!pred.evaluate(&json!({"city": "LA", "age": 70})));
    }

    #[test]
    fn test_dot_path_field() {
        let pred = compile(json!({"address.city": "Oakleigh"})).unwrap();
        assert!(pred.evaluate(&json!({"address": {"city": "Oakleigh"}})));
        assert!(!pred.evaluate(&json!({"address": "Oakleigh"})));
    }

    #[test]
    fn test_usage_errors() {
        assert!(compile(json!({"$nor": []})).is_err());
        assert!(compile(json!({"$or": {"a": 1}})).is_err());
        assert!(compile(json!({"$and": [1]})).is_err());
        assert!(compile(json!({"a": {"$in": 3}})).is_err());
        assert!(compile(json!({"a": {"$elemMatch": 3}})).is_err());
        assert!(compile(json!({"a": {"$nearSphere": {"$maxDistance": 5}}})).is_err());
        assert!(compile(json!([1])).is_err());
    }

    #[test]
    fn test_regex_field() {
        let pred = compile(json!({"stopName": {"$regex": "gdale$"}})).unwrap();
        assert!(pred.evaluate(&json!({"stopName": "Huntingdale"})));
        assert!(!pred.evaluate(&json!({"stopName": "Oakleigh"})));
    }

    #[test]
    fn test_elem_match_nested_or() {
        let pred = compile(json!({
            "bays": {"$elemMatch": {
                "mode": "bus",
                "$or": [{"stopGTFSID": "1"}, {"stopGTFSID": {"$in": ["2", "3"]}}]
            }}
        }))
        .unwrap();
        assert!(pred.evaluate(&json!({"bays": [{"mode": "tram", "stopGTFSID": "1"}, {"mode": "bus", "stopGTFSID": "3"}]})));
        assert!(!pred.evaluate(&json!({"bays": [{"mode": "tram", "stopGTFSID": "1"}, {"mode": "bus", "stopGTFSID": "4"}]})));
    }

    #[test]
    fn test_elem_match_scalar_elements_never_match_fields() {
        let pred = compile(json!({"tags": {"$elemMatch": {"name": "x"}}})).unwrap();
        assert!(!pred.evaluate(&json!({"tags": ["x", "y"]})));
    }

    #[test]
    fn test_near_sphere_sibling_max_distance() {
        let pred = compile(json!({
            "location": {
                "$nearSphere": {"$geometry": {"type": "Point", "coordinates": [145.0, -37.7]}},
                "$maxDistance": 1000
            }
        }))
        .unwrap();
        assert!(pred.evaluate(&json!({"location": {"type": "Point", "coordinates": [145.001, -37.7]}})));
        assert!(!pred.evaluate(&json!({"location": {"type": "Point", "coordinates": [145.1, -37.7]}})));
    }

    #[test]
    fn test_near_sphere_multipoint_any() {
        let pred = compile(json!({
            "bays.location": {"$nearSphere": {
                "$geometry": {"type": "Point", "coordinates": [145.0, -37.7]},
                "$maxDistance": 200
            }}
        }))
        .unwrap();
        let doc = json!({"bays": {"location": {
            "type": "MultiPoint",
            "coordinates": [[150.0, -30.0], [145.0005, -37.7]]
        }}});
        assert!(pred.evaluate(&doc));
    }

    #[test]
    fn test_near_sphere_legacy_center() {
        let pred = compile(json!({"loc": {"$nearSphere": [145.0, -37.7], "$maxDistance": 100}})).unwrap();
        assert!(pred.evaluate(&json!({"loc": [145.0, -37.7]})));
        assert!(!pred.evaluate(&json!({"loc": [146.0, -37.7]})));
    }
}
