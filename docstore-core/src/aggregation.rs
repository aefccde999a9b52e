// src/aggregation.rs
// Aggregation pipeline implementation: $match, $group, $sortByCount

use ahash::RandomState;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::document::ID_FIELD;
use crate::error::{DocStoreError, Result};
use crate::geo::Haversine;
use crate::query::{Predicate, QueryCompiler};
use crate::value_utils::{get_nested_value, CanonicalValue};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Parse a field reference from JSON value (e.g., "$fieldName" -> "fieldName")
fn parse_field_reference(value: &Value, op_name: &str) -> Result<String> {
    match value.as_str() {
        Some(s) if s.len() > 1 && s.starts_with('$') => Ok(s[1..].to_string()),
        Some(_) => Err(DocStoreError::AggregationError(format!(
            "{} field reference must start with $",
            op_name
        ))),
        None => Err(DocStoreError::AggregationError(format!(
            "{} must be a field reference",
            op_name
        ))),
    }
}

fn is_field_reference(value: &Value) -> bool {
    value.as_str().map(|s| s.starts_with('$')).unwrap_or(false)
}

type KeyedMap<V> = IndexMap<CanonicalValue, V, RandomState>;

/// Aggregation pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

/// Pipeline stage
#[derive(Debug, Clone)]
pub enum Stage {
    Match(MatchStage),
    Group(GroupStage),
    SortByCount(SortByCountStage),
}

/// $match stage - filter documents
#[derive(Debug, Clone)]
pub struct MatchStage {
    predicate: Predicate,
}

/// $group stage - deduplicate documents by a key expression
#[derive(Debug, Clone)]
pub struct GroupStage {
    id: GroupId,
}

#[derive(Debug, Clone)]
pub enum GroupId {
    /// `"$city"`: missing values group under `null`
    Field(String),
    /// `{ mode: "$mode", name: "$stopName" }`: missing components are omitted
    Composite(Vec<(String, GroupComponent)>),
    /// `null` or any other constant: one group
    Constant(Value),
}

#[derive(Debug, Clone)]
pub enum GroupComponent {
    Field(String),
    Constant(Value),
}

/// $sortByCount stage - tally a field and order by frequency
#[derive(Debug, Clone)]
pub struct SortByCountStage {
    field: String,
}

impl Pipeline {
    /// Create pipeline from JSON array, compiling `$match` filters with `compiler`
    pub fn parse(pipeline_json: &Value, compiler: &QueryCompiler) -> Result<Self> {
        let stages_array = pipeline_json.as_array().ok_or_else(|| {
            DocStoreError::AggregationError("Pipeline must be an array".to_string())
        })?;

        let stages = stages_array
            .iter()
            .map(|stage_json| Stage::parse(stage_json, compiler))
            .collect::<Result<Vec<_>>>()?;

        Ok(Pipeline { stages })
    }

    /// Create pipeline from JSON array using haversine distances
    pub fn from_json(pipeline_json: &Value) -> Result<Self> {
        Self::parse(pipeline_json, &QueryCompiler::new(Arc::new(Haversine)))
    }

    /// Execute pipeline on documents
    pub fn execute(&self, mut docs: Vec<Value>) -> Result<Vec<Value>> {
        for stage in &self.stages {
            docs = stage.execute(docs)?;
        }
        Ok(docs)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Stage {
    /// Parse stage from JSON
    fn parse(stage_json: &Value, compiler: &QueryCompiler) -> Result<Self> {
        let obj = stage_json.as_object().ok_or_else(|| {
            DocStoreError::AggregationError("Stage must be an object".to_string())
        })?;

        // Each stage should have exactly one key
        let (stage_name, stage_spec) = match (obj.len(), obj.iter().next()) {
            (1, Some(entry)) => entry,
            _ => {
                return Err(DocStoreError::AggregationError(
                    "Each stage must have exactly one operator".to_string(),
                ))
            }
        };

        match stage_name.as_str() {
            "$match" => Ok(Stage::Match(MatchStage {
                predicate: compiler.compile(stage_spec)?,
            })),
            "$group" => Ok(Stage::Group(GroupStage::from_json(stage_spec)?)),
            "$sortByCount" => Ok(Stage::SortByCount(SortByCountStage {
                field: parse_field_reference(stage_spec, "$sortByCount")?,
            })),
            _ => Err(DocStoreError::AggregationError(format!(
                "Unknown pipeline stage: {}",
                stage_name
            ))),
        }
    }

    /// Execute this stage
    fn execute(&self, docs: Vec<Value>) -> Result<Vec<Value>> {
        match self {
            Stage::Match(stage) => Ok(stage.execute(docs)),
            Stage::Group(stage) => Ok(stage.execute(docs)),
            Stage::SortByCount(stage) => Ok(stage.execute(docs)),
        }
    }
}

impl MatchStage {
    fn execute(&self, docs: Vec<Value>) -> Vec<Value> {
        docs.into_iter()
            .filter(|doc| self.predicate.evaluate(doc))
            .collect()
    }
}

impl GroupStage {
    fn from_json(spec: &Value) -> Result<Self> {
        let obj = spec.as_object().ok_or_else(|| {
            DocStoreError::AggregationError("$group must be an object".to_string())
        })?;

        if let Some(field) = obj.keys().find(|k| k.as_str() != ID_FIELD) {
            return Err(DocStoreError::AggregationError(format!(
                "$group accumulators are not supported (field '{}')",
                field
            )));
        }

        let id_value = obj.get(ID_FIELD).ok_or_else(|| {
            DocStoreError::AggregationError("Group stage must have _id field".to_string())
        })?;

        let id = match id_value {
            Value::Object(components) => GroupId::Composite(
                components
                    .iter()
                    .map(|(name, value)| -> Result<(String, GroupComponent)> {
                        let component = if is_field_reference(value) {
                            GroupComponent::Field(parse_field_reference(value, "$group _id")?)
                        } else {
                            GroupComponent::Constant(value.clone())
                        };
                        Ok((name.clone(), component))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            value if is_field_reference(value) => {
                GroupId::Field(parse_field_reference(value, "$group _id")?)
            }
            constant => GroupId::Constant(constant.clone()),
        };

        Ok(GroupStage { id })
    }

    fn execute(&self, docs: Vec<Value>) -> Vec<Value> {
        let mut groups: KeyedMap<Value> = KeyedMap::default();

        for doc in &docs {
            let key = self.group_key(doc);
            groups
                .entry(CanonicalValue::from_value(&key))
                .or_insert(key);
        }

        groups
            .into_values()
            .map(|key| {
                let mut result = Map::new();
                result.insert(ID_FIELD.to_string(), key);
                Value::Object(result)
            })
            .collect()
    }

    fn group_key(&self, doc: &Value) -> Value {
        match &self.id {
            GroupId::Field(path) => get_nested_value(doc, path).cloned().unwrap_or(Value::Null),
            GroupId::Constant(value) => value.clone(),
            GroupId::Composite(components) => {
                let mut key = Map::new();
                for (name, component) in components {
                    let value = match component {
                        GroupComponent::Field(path) => get_nested_value(doc, path).cloned(),
                        GroupComponent::Constant(value) => Some(value.clone()),
                    };
                    if let Some(value) = value {
                        key.insert(name.clone(), value);
                    }
                }
                Value::Object(key)
            }
        }
    }
}

impl SortByCountStage {
    fn execute(&self, docs: Vec<Value>) -> Vec<Value> {
        let mut tally: KeyedMap<(Value, u64)> = KeyedMap::default();

        for doc in &docs {
            let value = get_nested_value(doc, &self.field)
                .cloned()
                .unwrap_or(Value::Null);
            tally
                .entry(CanonicalValue::from_value(&value))
                .or_insert((value, 0))
                .1 += 1;
        }

        let mut counts: Vec<(Value, u64)> = tally.into_values().collect();
        // Stable: ties keep first-seen order
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        counts
            .into_iter()
            .map(|(value, count)| {
                let mut result = Map::new();
                result.insert(ID_FIELD.to_string(), value);
                result.insert("count".to_string(), Value::from(count));
                Value::Object(result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stops() -> Vec<Value> {
        vec![
            json!({"mode": "bus", "stopName": "Dole Avenue/Cheddar Road", "id": 0}),
            json!({"mode": "bus", "stopName": "Huntingdale Station", "id": 1}),
            json!({"mode": "bus", "stopName": "Huntingdale Station", "id": 2}),
            json!({"mode": "bus", "stopName": "Huntingdale Station", "id": 3}),
            json!({"mode": "bus", "stopName": "Oakleigh Station", "id": 4}),
            json!({"mode": "metro", "stopName": "Nunawading Station", "id": 5}),
        ]
    }

    fn run(pipeline: Value, docs: Vec<Value>) -> Vec<Value> {
        Pipeline::from_json(&pipeline).unwrap().execute(docs).unwrap()
    }

    // ========== Pipeline tests ==========

    #[test]
    fn test_pipeline_not_array() {
        let result = Pipeline::from_json(&json!({"$match": {}}));
        assert!(result.unwrap_err().to_string().contains("must be an array"));
    }

    #[test]
    fn test_pipeline_empty_passes_through() {
        assert_eq!(run(json!([]), stops()).len(), 6);
    }

    #[test]
    fn test_stage_errors() {
        let err = Pipeline::from_json(&json!(["invalid"])).unwrap_err();
        assert!(err.to_string().contains("must be an object"));

        let err = Pipeline::from_json(&json!([{"$match": {}, "$group": {"_id": null}}])).unwrap_err();
        assert!(err.to_string().contains("exactly one operator"));

        let err = Pipeline::from_json(&json!([{"$project": {"a": 1}}])).unwrap_err();
        assert!(err.to_string().contains("Unknown pipeline stage"));
    }

    // ========== $match ==========

    #[test]
    fn test_match() {
        let results = run(json!([{"$match": {"mode": "metro"}}]), stops());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["id"], 5);
    }

    #[test]
    fn test_match_invalid_query() {
        assert!(Pipeline::from_json(&json!([{"$match": {"$nor": []}}])).is_err());
    }

    // ========== $group ==========

    #[test]
    fn test_group_composite_key() {
        let results = run(
            json!([{"$match": {}}, {"$group": {"_id": {"mode": "$mode", "name": "$stopName"}}}]),
            stops(),
        );
        assert_eq!(
            results,
            vec![
                json!({"_id": {"mode": "bus", "name": "Dole Avenue/Cheddar Road"}}),
                json!({"_id": {"mode": "bus", "name": "Huntingdale Station"}}),
                json!({"_id": {"mode": "bus", "name": "Oakleigh Station"}}),
                json!({"_id": {"mode": "metro", "name": "Nunawading Station"}}),
            ]
        );
    }

    #[test]
    fn test_group_single_field_and_null() {
        let by_mode = run(json!([{"$group": {"_id": "$mode"}}]), stops());
        assert_eq!(by_mode, vec![json!({"_id": "bus"}), json!({"_id": "metro"})]);

        let all = run(json!([{"$group": {"_id": null}}]), stops());
        assert_eq!(all, vec![json!({"_id": null})]);
    }

    #[test]
    fn test_group_missing_components_omitted() {
        let docs = vec![json!({"a": 1}), json!({"a": 1, "b": 2}), json!({"b": 2})];
        let results = run(json!([{"$group": {"_id": {"a": "$a", "b": "$b"}}}]), docs);
        assert_eq!(
            results,
            vec![
                json!({"_id": {"a": 1}}),
                json!({"_id": {"a": 1, "b": 2}}),
                json!({"_id": {"b": 2}}),
            ]
        );
    }

    #[test]
    fn test_group_numeric_keys_collapse() {
        let docs = vec![json!({"n": 1}), json!({"n": 1.0}), json!({"n": 2})];
        assert_eq!(run(json!([{"$group": {"_id": "$n"}}]), docs).len(), 2);
    }

    #[test]
    fn test_group_errors() {
        assert!(Pipeline::from_json(&json!([{"$group": {}}])).is_err());
        assert!(Pipeline::from_json(&json!([{"$group": "$a"}])).is_err());
        let err = Pipeline::from_json(&json!([{"$group": {"_id": "$a", "total": {"$sum": 1}}}]))
            .unwrap_err();
        assert!(matches!(err, DocStoreError::AggregationError(_)));
    }

    // ========== $sortByCount ==========

    #[test]
    fn test_sort_by_count() {
        let mut docs = Vec::new();
        for i in 0..45 {
            // Interleave so neither value is contiguous
            let name = if i % 9 < 4 { "A" } else { "B" };
            docs.push(json!({"name": name}));
        }
        let results = run(json!([{"$match": {}}, {"$sortByCount": "$name"}]), docs);
        assert_eq!(
            results,
            vec![json!({"_id": "B", "count": 25}), json!({"_id": "A", "count": 20})]
        );
    }

    #[test]
    fn test_sort_by_count_ties_and_missing() {
        let docs = vec![json!({"k": "x"}), json!({}), json!({"k": "y"}), json!({"k": null})];
        let results = run(json!([{"$sortByCount": "$k"}]), docs);
        assert_eq!(
            results,
            vec![
                json!({"_id": null, "count": 2}),
                json!({"_id": "x", "count": 1}),
                json!({"_id": "y", "count": 1}),
            ]
        );
    }

    #[test]
    fn test_sort_by_count_requires_reference() {
        assert!(Pipeline::from_json(&json!([{"$sortByCount": "name"}])).is_err());
        assert!(Pipeline::from_json(&json!([{"$sortByCount": 1}])).is_err());
    }
}
