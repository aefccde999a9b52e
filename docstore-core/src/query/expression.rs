// src/query/expression.rs
//! Tagged field expressions
//!
//! A filter value is classified once, at compile time, into a `QueryExpr`:
//!
//! ```text
//! { stopName: "Huntingdale" }              -> Literal("Huntingdale")
//! { _id: { $lte: 5 } }                      -> Operators([Lte(5)])
//! { stopName: { $regex: "^Hunt", $options: "i" } } -> Pattern(/^Hunt/i)
//! { a: { b: 1 } }                           -> Literal({b: 1})  (no `$` key)
//! ```

use regex::Regex;
use serde_json::Value;
use tracing::trace;

use super::operators::compile_pattern;
use crate::error::{DocStoreError, Result};

/// A field-level query expression
#[derive(Debug, Clone)]
pub enum QueryExpr {
    /// Equality / array-membership against a literal value
    Literal(Value),
    /// Operator tags combined with AND semantics
    Operators(Vec<OperatorClause>),
    /// A compiled regular expression
    Pattern(Regex),
}

/// One recognized operator tag with its payload
#[derive(Debug, Clone)]
pub enum OperatorClause {
    In(Vec<Value>),
    Ne(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Exists(bool),
    Not(Box<QueryExpr>),
}

/// Which operator tags a parse recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    /// Top-level field conditions: everything, including `$not` and `$regex`
    Full,
    /// Sub-fields of `$elemMatch`: comparison tags only
    Static,
}

/// True when `value` is an object with at least one `$`-prefixed key
pub fn is_operator_object(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| obj.keys().any(|k| k.starts_with('$')))
        .unwrap_or(false)
}

impl QueryExpr {
    /// Classify a filter value for a top-level field
    pub fn parse(value: &Value) -> Result<Self> {
        Self::parse_dialect(value, Dialect::Full)
    }

    /// Classify a filter value for an `$elemMatch` sub-field
    ///
    /// `$not` and `$regex` are not recognized there and are ignored like any
    /// other unknown tag.
    pub fn parse_static(value: &Value) -> Result<Self> {
        Self::parse_dialect(value, Dialect::Static)
    }

    fn parse_dialect(value: &Value, dialect: Dialect) -> Result<Self> {
        let obj = match value {
            Value::Object(obj) if is_operator_object(value) => obj,
            _ => return Ok(QueryExpr::Literal(value.clone())),
        };

        if dialect == Dialect::Full {
            if let Some(pattern) = obj.get("$regex") {
                return parse_pattern(pattern, obj.get("$options")).map(QueryExpr::Pattern);
            }
            // $not short-circuits every other tag
            if let Some(inner) = obj.get("$not") {
                let negated = Self::parse_dialect(inner, Dialect::Full)?;
                return Ok(QueryExpr::Operators(vec![OperatorClause::Not(Box::new(
                    negated,
                ))]));
            }
        }

        let mut clauses = Vec::with_capacity(obj.len());
        for (tag, payload) in obj {
            let clause = match tag.as_str() {
                "$in" => match payload {
                    Value::Array(values) => OperatorClause::In(values.clone()),
                    _ => {
                        return Err(DocStoreError::InvalidQuery(
                            "$in operator requires an array".to_string(),
                        ))
                    }
                },
                "$ne" => OperatorClause::Ne(payload.clone()),
                "$lt" => OperatorClause::Lt(payload.clone()),
                "$lte" => OperatorClause::Lte(payload.clone()),
                "$gt" => OperatorClause::Gt(payload.clone()),
                "$gte" => OperatorClause::Gte(payload.clone()),
                "$exists" => match payload {
                    Value::Bool(flag) => OperatorClause::Exists(*flag),
                    _ => {
                        return Err(DocStoreError::InvalidQuery(
                            "$exists operator requires a boolean".to_string(),
                        ))
                    }
                },
                other => {
                    trace!(tag = other, "ignoring unrecognized operator tag");
                    continue;
                }
            };
            clauses.push(clause);
        }

        Ok(QueryExpr::Operators(clauses))
    }
}

/// Build a regex from `$regex` / `$options` payloads
pub(crate) fn parse_pattern(pattern: &Value, options: Option<&Value>) -> Result<Regex> {
    let pattern = pattern.as_str().ok_or_else(|| {
        DocStoreError::InvalidQuery("$regex operator requires a string pattern".to_string())
    })?;
    let options = match options {
        None => "",
        Some(Value::String(s)) => s.as_str(),
        Some(_) => {
            return Err(DocStoreError::InvalidQuery(
                "$options must be a string".to_string(),
            ))
        }
    };
    compile_pattern(pattern, options)
}
