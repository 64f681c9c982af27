//! Evaluation of the store filter dialect against in-memory documents.
//!
//! Supported: literal equality (with array membership), `$eq`, `$ne`,
//! `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`,
//! `$regex` with `$options`, and `$and` / `$or` at any level. Field paths may
//! be dotted and traverse arrays of sub-documents.

use std::cmp::Ordering;

use nlq_core::{Document, Value};
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value as JsonValue};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Parsed form
// ---------------------------------------------------------------------------

/// Compiled filter.
#[derive(Debug, Clone)]
pub enum FilterExpr {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Field { path: String, predicates: Vec<Predicate> },
}

/// One operator applied to the values found at a path.
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Regex),
}

fn invalid(msg: impl Into<String>) -> StoreError {
    StoreError::InvalidFilter(msg.into())
}

impl FilterExpr {
    /// Compiles a filter document. An empty document matches everything.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] for unknown operators, wrongly
    /// typed operands, or regular expressions that do not compile.
    pub fn parse(filter: &Map<String, JsonValue>) -> Result<Self, StoreError> {
        filter
            .iter()
            .map(|(key, value)| parse_entry(key, value))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::And)
    }

    /// True when `doc` satisfies the filter.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|p| p.matches(doc)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(doc)),
            Self::Field { path, predicates } => {
                let found = lookup(doc, path);
                predicates.iter().all(|p| p.test(&found))
            }
        }
    }
}

fn parse_entry(key: &str, value: &JsonValue) -> Result<FilterExpr, StoreError> {
    match key {
        "$and" | "$or" => {
            let branches = value
                .as_array()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| invalid(format!("{key} requires a non-empty array")))?;
            let parsed = branches
                .iter()
                .map(|b| {
                    b.as_object()
                        .ok_or_else(|| invalid(format!("{key} branches must be documents")))
                        .and_then(FilterExpr::parse)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if key == "$and" {
                FilterExpr::And(parsed)
            } else {
                FilterExpr::Or(parsed)
            })
        }
        op if op.starts_with('$') => Err(invalid(format!("unsupported top-level operator {op}"))),
        path => Ok(FilterExpr::Field {
            path: path.to_string(),
            predicates: parse_predicates(value)?,
        }),
    }
}

fn is_operator_document(obj: &Map<String, JsonValue>) -> bool {
    let extended = obj.len() == 1 && obj.keys().any(|k| matches!(k.as_str(), "$oid" | "$date" | "$binary"));
    !obj.is_empty() && !extended && obj.keys().all(|k| k.starts_with('$'))
}

fn parse_predicates(value: &JsonValue) -> Result<Vec<Predicate>, StoreError> {
    let obj = match value {
        JsonValue::Object(obj) if is_operator_document(obj) => obj,
        literal => return Ok(vec![Predicate::Eq(Value::from_json(literal.clone()))]),
    };

    let mut predicates = Vec::with_capacity(obj.len());
    for (op, operand) in obj {
        let literal = || Value::from_json(operand.clone());
        let list = || {
            operand
                .as_array()
                .map(|items| items.iter().cloned().map(Value::from_json).collect::<Vec<_>>())
                .ok_or_else(|| invalid(format!("{op} requires an array")))
        };
        let predicate = match op.as_str() {
            "$eq" => Predicate::Eq(literal()),
            "$ne" => Predicate::Ne(literal()),
            "$gt" => Predicate::Gt(literal()),
            "$gte" => Predicate::Gte(literal()),
            "$lt" => Predicate::Lt(literal()),
            "$lte" => Predicate::Lte(literal()),
            "$in" => Predicate::In(list()?),
            "$nin" => Predicate::Nin(list()?),
            "$exists" => Predicate::Exists(
                operand
                    .as_bool()
                    .ok_or_else(|| invalid("$exists requires a boolean"))?,
            ),
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| invalid("$regex requires a string"))?;
                let options = obj.get("$options").and_then(JsonValue::as_str).unwrap_or("");
                Predicate::Regex(compile_regex(pattern, options)?)
            }
            "$options" if obj.contains_key("$regex") => continue,
            other => return Err(invalid(format!("unsupported operator {other}"))),
        };
        predicates.push(predicate);
    }
    Ok(predicates)
}

fn compile_regex(pattern: &str, options: &str) -> Result<Regex, StoreError> {
    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(|e| invalid(format!("bad $regex: {e}")))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Values reachable at a dotted `path`. Arrays of sub-documents fan out.
#[must_use]
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split('.');
    let mut current: Vec<&Value> = segments
        .next()
        .and_then(|first| doc.get(first))
        .into_iter()
        .collect();
    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Map(map) => next.extend(map.get(segment)),
                Value::Array(items) => next.extend(
                    items
                        .iter()
                        .filter_map(Value::as_map)
                        .filter_map(|m| m.get(segment)),
                ),
                _ => {}
            }
        }
        current = next;
    }
    current
}

/// Found values plus the elements of any arrays among them.
fn expanded<'a>(found: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::with_capacity(found.len());
    for value in found {
        out.push(*value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn equals_any(found: &[&Value], target: &Value) -> bool {
    if *target == Value::Null && found.is_empty() {
        return true;
    }
    expanded(found).iter().any(|v| values_equal(v, target))
}

/// Ordering between values of the same comparable kind.
fn comparable_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) | (Value::ObjectId(x), Value::ObjectId(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

fn compares(found: &[&Value], target: &Value, accept: fn(Ordering) -> bool) -> bool {
    expanded(found)
        .iter()
        .any(|v| comparable_order(v, target).is_some_and(accept))
}

impl Predicate {
    fn test(&self, found: &[&Value]) -> bool {
        match self {
            Self::Eq(v) => equals_any(found, v),
            Self::Ne(v) => !equals_any(found, v),
            Self::Gt(v) => compares(found, v, Ordering::is_gt),
            Self::Gte(v) => compares(found, v, Ordering::is_ge),
            Self::Lt(v) => compares(found, v, Ordering::is_lt),
            Self::Lte(v) => compares(found, v, Ordering::is_le),
            Self::In(vs) => vs.iter().any(|v| equals_any(found, v)),
            Self::Nin(vs) => !vs.iter().any(|v| equals_any(found, v)),
            Self::Exists(expected) => found.is_empty() != *expected,
            Self::Regex(re) => expanded(found)
                .iter()
                .any(|v| v.as_str().is_some_and(|s| re.is_match(s))),
        }
    }
}

// ---------------------------------------------------------------------------
// Sort order
// ---------------------------------------------------------------------------

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Int(_) | Value::Float(_) => 1,
        Value::String(_) => 2,
        Value::Map(_) => 3,
        Value::Array(_) => 4,
        Value::Bytes(_) => 5,
        Value::ObjectId(_) => 6,
        Value::Bool(_) => 7,
        Value::Date(_) => 8,
    }
}

/// Total order used for sorting. Missing values sort as `null`, and values
/// of different kinds order by kind first.
#[must_use]
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| sort_order(Some(l), Some(r)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Map(_), Value::Map(_)) => a.to_json().to_string().cmp(&b.to_json().to_string()),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => comparable_order(a, b).unwrap_or(Ordering::Equal),
        },
    })
}
