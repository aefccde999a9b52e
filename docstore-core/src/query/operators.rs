// src/query/operators.rs
//! Value Matcher
//!
//! Evaluates a single field's `QueryExpr` against the value found at that
//! field (`None` when the field is absent).
//!
//! # Rules
//!
//! - literal array vs stored array: same length, pairwise equal
//! - literal vs stored array: the literal is a member of the array
//! - literal vs anything else: value equality (an absent field equals `null`)
//! - operators: `$not` negates; otherwise every clause must hold

use lazy_static::lazy_static;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::num::NonZeroUsize;

use super::expression::{OperatorClause, QueryExpr};
use crate::error::{DocStoreError, Result};
use crate::value_utils::{compare_values, values_equal};

const DEFAULT_REGEX_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => unreachable!(),
};

// ============================================================================
// REGEX COMPILATION (cached)
// ============================================================================

lazy_static! {
    /// Global cache for compiled regex patterns
    /// Key format: "pattern:options"
    static ref REGEX_CACHE: Mutex<LruCache<String, Regex>> =
        Mutex::new(LruCache::new(DEFAULT_REGEX_CACHE_CAPACITY));
}

/// Resize the compiled-pattern cache (evicts least recently used entries)
pub fn set_regex_cache_capacity(capacity: usize) {
    if let Some(capacity) = NonZeroUsize::new(capacity) {
        REGEX_CACHE.lock().resize(capacity);
    }
}

/// Build regex pattern string with MongoDB-style options
///
/// Converts MongoDB options (i, m, s, x) to Rust regex inline flags
fn build_regex_pattern(pattern: &str, options: &str) -> String {
    let mut regex_str = String::new();

    let valid_options: String = options
        .chars()
        .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
        .collect();

    if !valid_options.is_empty() {
        regex_str.push_str("(?");
        regex_str.push_str(&valid_options);
        regex_str.push(')');
    }

    regex_str.push_str(pattern);
    regex_str
}

/// Get or compile a regex pattern with caching
pub(crate) fn compile_pattern(pattern: &str, options: &str) -> Result<Regex> {
    let cache_key = format!("{}:{}", pattern, options);

    if let Some(regex) = REGEX_CACHE.lock().get(&cache_key) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&build_regex_pattern(pattern, options)).map_err(|e| {
        DocStoreError::InvalidQuery(format!("Invalid regex pattern '{}': {}", pattern, e))
    })?;

    REGEX_CACHE.lock().put(cache_key, regex.clone());
    Ok(regex)
}

// ============================================================================
// MATCHING
// ============================================================================

/// Match a stored value against a field expression
pub fn matches_expr(target: Option<&Value>, expr: &QueryExpr) -> bool {
    match expr {
        QueryExpr::Literal(query) => matches_literal(target, query),
        QueryExpr::Pattern(regex) => matches_pattern(target, regex),
        QueryExpr::Operators(clauses) => clauses.iter().all(|c| matches_clause(target, c)),
    }
}

/// Regex search against a string value; anything else never matches
pub fn matches_pattern(target: Option<&Value>, regex: &Regex) -> bool {
    match target {
        Some(Value::String(s)) => regex.is_match(s),
        _ => false,
    }
}

fn matches_literal(target: Option<&Value>, query: &Value) -> bool {
    match (target, query) {
        (Some(Value::Array(stored)), Value::Array(wanted)) => {
            stored.len() == wanted.len()
                && stored.iter().zip(wanted).all(|(a, b)| values_equal(a, b))
        }
        (Some(Value::Array(stored)), wanted) => stored.iter().any(|v| values_equal(v, wanted)),
        (Some(stored), wanted) => values_equal(stored, wanted),
        (None, wanted) => wanted.is_null(),
    }
}

fn equals_or_absent_null(target: Option<&Value>, value: &Value) -> bool {
    match target {
        Some(stored) => values_equal(stored, value),
        None => value.is_null(),
    }
}

fn compare_with<F>(target: Option<&Value>, value: &Value, predicate: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    target
        .and_then(|stored| compare_values(stored, value))
        .map(predicate)
        .unwrap_or(false)
}

fn matches_clause(target: Option<&Value>, clause: &OperatorClause) -> bool {
    match clause {
        OperatorClause::In(values) => values.iter().any(|v| equals_or_absent_null(target, v)),
        OperatorClause::Ne(value) => !equals_or_absent_null(target, value),
        OperatorClause::Lt(value) => compare_with(target, value, |ord| ord == Ordering::Less),
        OperatorClause::Lte(value) => compare_with(target, value, |ord| ord != Ordering::Greater),
        OperatorClause::Gt(value) => compare_with(target, value, |ord| ord == Ordering::Greater),
        OperatorClause::Gte(value) => compare_with(target, value, |ord| ord != Ordering::Less),
        OperatorClause::Exists(flag) => target.is_some() == *flag,
        OperatorClause::Not(inner) => !matches_expr(target, inner),
    }
}
