// src/query/predicate.rs
//! Compiled predicate tree and its interpreter

use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

use super::expression::QueryExpr;
use super::operators::{matches_expr, matches_pattern};
use crate::document::Document;
use crate::geo::{GeoPoint, Geodesy, Geometry};
use crate::value_utils::{get_nested_value, lookup_path, PathLookup};

/// A compiled filter
#[derive(Debug, Clone)]
pub enum Predicate {
    /// All children hold (an empty list always holds)
    And(Vec<Predicate>),
    /// Some child holds
    Or(Vec<Predicate>),
    Field { path: String, expr: QueryExpr },
    Regex { path: String, pattern: Regex },
    ElemMatch { path: String, spec: ElemMatchSpec },
    NearSphere(NearSphere),
}

/// Conditions applied to each element of an array field
#[derive(Debug, Clone, Default)]
pub struct ElemMatchSpec {
    /// Sub-field conditions, all of which must hold
    pub fields: Vec<(String, QueryExpr)>,
    /// Nested `$or`: some alternative must have all its fields hold
    pub any_of: Option<Vec<Vec<(String, QueryExpr)>>>,
}

/// Great-circle proximity test
#[derive(Debug, Clone)]
pub struct NearSphere {
    pub path: String,
    pub center: GeoPoint,
    /// `f64::INFINITY` when no `$maxDistance` was given
    pub max_distance_m: f64,
    pub geodesy: Arc<dyn Geodesy>,
}

impl Predicate {
    /// A predicate that holds for every document
    pub fn always() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.evaluate(doc.as_value())
    }

    /// Evaluate against any JSON value (aggregation stages see non-stored values)
    pub fn evaluate(&self, doc: &Value) -> bool {
        match self {
            Predicate::And(children) => children.iter().all(|p| p.evaluate(doc)),
            Predicate::Or(children) => children.iter().any(|p| p.evaluate(doc)),
            Predicate::Field { path, expr } => matches_expr(get_nested_value(doc, path), expr),
            Predicate::Regex { path, pattern } => {
                matches_pattern(get_nested_value(doc, path), pattern)
            }
            Predicate::ElemMatch { path, spec } => match get_nested_value(doc, path) {
                Some(Value::Array(elements)) => elements.iter().any(|el| spec.matches_element(el)),
                _ => false,
            },
            Predicate::NearSphere(near) => near.evaluate(doc),
        }
    }
}

impl ElemMatchSpec {
    fn matches_element(&self, element: &Value) -> bool {
        let fields_hold = self.fields.iter().all(|(path, expr)| match lookup_path(element, path) {
            PathLookup::Found(value) => matches_expr(Some(value), expr),
            PathLookup::MissingLeaf => matches_expr(None, expr),
            PathLookup::Unreachable => false,
        });
        if !fields_hold {
            return false;
        }

        match &self.any_of {
            None => true,
            Some(alternatives) => alternatives.iter().any(|alternative| {
                alternative
                    .iter()
                    .all(|(path, expr)| matches_expr(get_nested_value(element, path), expr))
            }),
        }
    }
}

impl NearSphere {
    fn evaluate(&self, doc: &Value) -> bool {
        let geometry = match get_nested_value(doc, &self.path).and_then(Geometry::from_value) {
            Some(geometry) => geometry,
            None => return false,
        };
        let max_km = self.max_distance_m / 1000.0;
        geometry
            .points()
            .iter()
            .any(|point| self.geodesy.distance(point, &self.center) < max_km)
    }
}
