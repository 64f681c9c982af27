//! Query descriptors: the translator's output and the store's find request.
//!
//! A [`QueryDescriptor`] keeps the executable part ([`ExecutableQuery`]) and
//! the metadata ([`QueryMeta`]) in separate fields. Only the executable part
//! is ever lowered to a [`FindRequest`], so metadata cannot leak into what
//! the store executes.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value as JsonValue};

use crate::matcher::CollectionStrategy;
use crate::types::Value;

/// Upper bound accepted for `limit` on a find request.
pub const MAX_FIND_LIMIT: u64 = 1000;

/// Limit used when a find request omits one.
pub const DEFAULT_FIND_LIMIT: u64 = 100;

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// Coarse operation class requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Count,
    Find,
    Aggregate,
    Distinct,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Count => "count",
            Self::Find => "find",
            Self::Aggregate => "aggregate",
            Self::Distinct => "distinct",
        })
    }
}

// ---------------------------------------------------------------------------
// Filter predicate tree
// ---------------------------------------------------------------------------

/// Ordering comparison against a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    NotEqual,
}

impl Comparison {
    /// Store operator key.
    #[must_use]
    pub fn operator(self) -> &'static str {
        match self {
            Self::GreaterThan => "$gt",
            Self::GreaterOrEqual => "$gte",
            Self::LessThan => "$lt",
            Self::LessOrEqual => "$lte",
            Self::NotEqual => "$ne",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::NotEqual => "!=",
        }
    }
}

/// Single-field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Literal equality.
    Equals(Value),
    /// Array membership of one value.
    Contains(Value),
    /// Value is one of a set.
    MatchesAnyOf(Vec<Value>),
    /// Whole-value match ignoring case.
    CaseInsensitiveEquals(String),
    /// Substring match ignoring case.
    CaseInsensitiveContains(String),
    /// Ordering or inequality comparison.
    Compare(Comparison, Value),
    /// Several comparisons on one field, all of which must hold.
    Range(Vec<(Comparison, Value)>),
}

impl Condition {
    /// Store filter dialect form of this condition.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Equals(v) => v.to_json(),
            Self::Contains(v) => json!({ "$in": [v.to_json()] }),
            Self::MatchesAnyOf(vs) => json!({ "$in": vs.iter().map(Value::to_json).collect::<Vec<_>>() }),
            Self::CaseInsensitiveEquals(s) => json!({
                "$regex": format!("^{}$", regex::escape(s)),
                "$options": "i",
            }),
            Self::CaseInsensitiveContains(s) => json!({
                "$regex": regex::escape(s),
                "$options": "i",
            }),
            Self::Compare(op, v) => json!({ op.operator(): v.to_json() }),
            Self::Range(bounds) => JsonValue::Object(
                bounds
                    .iter()
                    .map(|(op, v)| (op.operator().to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(v) => write!(f, "is {v}"),
            Self::Contains(v) => write!(f, "contains {v}"),
            Self::MatchesAnyOf(vs) => {
                let parts: Vec<String> = vs.iter().map(ToString::to_string).collect();
                write!(f, "is one of {}", parts.join(", "))
            }
            Self::CaseInsensitiveEquals(s) => write!(f, "is {s}"),
            Self::CaseInsensitiveContains(s) => write!(f, "contains {s}"),
            Self::Compare(op, v) => write!(f, "{} {v}", op.symbol()),
            Self::Range(bounds) => {
                let parts: Vec<String> = bounds.iter().map(|(op, v)| format!("{} {v}", op.symbol())).collect();
                f.write_str(&parts.join(" and "))
            }
        }
    }
}

/// One branch of a disjunction: exactly one field, one condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub field: String,
    pub condition: Condition,
}

/// Conjunction of per-field conditions plus at most one disjunction.
///
/// Disjunction branches are flat [`Branch`] leaves, so nesting is
/// unrepresentable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: IndexMap<String, Condition>,
    any_of: Vec<Branch>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the condition for `field`, replacing any earlier one.
    pub fn set(&mut self, field: impl Into<String>, condition: Condition) {
        self.conditions.insert(field.into(), condition);
    }

    /// Adds a comparison on `field`, keeping earlier comparisons with other
    /// operators. A repeated operator replaces its earlier bound; any
    /// non-comparison condition on the field is replaced.
    pub fn constrain(&mut self, field: impl Into<String>, op: Comparison, value: Value) {
        let field = field.into();
        let mut bounds = match self.conditions.get(&field) {
            Some(Condition::Compare(prev_op, prev)) => vec![(*prev_op, prev.clone())],
            Some(Condition::Range(prev)) => prev.clone(),
            _ => Vec::new(),
        };
        match bounds.iter_mut().find(|(existing, _)| *existing == op) {
            Some(slot) => slot.1 = value,
            None => bounds.push((op, value)),
        }
        let condition = if bounds.len() == 1 {
            let (op, value) = bounds.remove(0);
            Condition::Compare(op, value)
        } else {
            Condition::Range(bounds)
        };
        self.conditions.insert(field, condition);
    }

    /// Replaces the disjunction. An empty list clears it.
    pub fn set_any_of(&mut self, branches: Vec<Branch>) {
        self.any_of = branches;
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.conditions.get(field)
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn any_of(&self) -> &[Branch] {
        &self.any_of
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.any_of.is_empty()
    }

    /// Store filter document.
    #[must_use]
    pub fn to_json(&self) -> Map<String, JsonValue> {
        let mut out: Map<String, JsonValue> = self
            .conditions
            .iter()
            .map(|(field, cond)| (field.clone(), cond.to_json()))
            .collect();
        if !self.any_of.is_empty() {
            let branches = self
                .any_of
                .iter()
                .map(|b| json!({ b.field.clone(): b.condition.to_json() }))
                .collect();
            out.insert("$or".to_string(), JsonValue::Array(branches));
        }
        out
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(field, cond)| format!("{field} {cond}"))
            .collect();
        if !self.any_of.is_empty() {
            let alternatives: Vec<String> = self
                .any_of
                .iter()
                .map(|b| format!("{} {}", b.field, b.condition))
                .collect();
            parts.push(format!("({})", alternatives.join(" or ")));
        }
        f.write_str(&parts.join(" and "))
    }
}

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// `1` or `-1`, as the store expects.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

// ---------------------------------------------------------------------------
// Executable query and metadata
// ---------------------------------------------------------------------------

/// The part of a descriptor the store may see.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableQuery {
    pub database: String,
    pub collection: String,
    pub filter: Filter,
    /// Field to include (`true`) or exclude (`false`).
    pub projection: Option<IndexMap<String, bool>>,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: u64,
}

impl ExecutableQuery {
    /// Lowers to the store's wire request.
    #[must_use]
    pub fn to_find_request(&self) -> FindRequest {
        FindRequest {
            db_name: self.database.clone(),
            collection_name: self.collection.clone(),
            filter: self.filter.to_json(),
            projection: self.projection.as_ref().map(|p| {
                p.iter()
                    .map(|(field, include)| (field.clone(), JsonValue::from(i32::from(*include))))
                    .collect()
            }),
            sort: (!self.sort.is_empty()).then(|| {
                self.sort
                    .iter()
                    .map(|k| {
                        let mut entry = IndexMap::new();
                        entry.insert(k.field.clone(), k.direction.as_i32());
                        entry
                    })
                    .collect()
            }),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

impl Serialize for ExecutableQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_find_request().serialize(serializer)
    }
}

/// How the translator reached its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMeta {
    pub intent: Intent,
    pub collection_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_strategy: Option<CollectionStrategy>,
    pub original_query: String,
    pub processed_query: String,
    /// Names of the condition extractors that contributed, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extractors: Vec<String>,
    /// The limit came from a numeral in the text rather than a default.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub explicit_limit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Translator output: executable query (absent on failure) plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDescriptor {
    pub query: Option<ExecutableQuery>,
    #[serde(rename = "_meta")]
    pub meta: QueryMeta,
}

impl QueryDescriptor {
    /// Error message, when translation failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.meta.error.as_deref()
    }

    /// Wire request for the executable part.
    #[must_use]
    pub fn find_request(&self) -> Option<FindRequest> {
        self.query.as_ref().map(ExecutableQuery::to_find_request)
    }
}

// ---------------------------------------------------------------------------
// Store wire types
// ---------------------------------------------------------------------------

fn default_limit() -> u64 {
    DEFAULT_FIND_LIMIT
}

/// Find request accepted by a document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindRequest {
    pub db_name: String,
    pub collection_name: String,
    #[serde(default)]
    pub filter: Map<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Map<String, JsonValue>>,
    /// Ordered `{field: 1 | -1}` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<IndexMap<String, i32>>>,
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

impl FindRequest {
    /// Checks `limit` is within `1..=MAX_FIND_LIMIT` and sort directions are ±1.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending parameter.
    pub fn validate(&self) -> Result<(), String> {
        if self.limit == 0 || self.limit > MAX_FIND_LIMIT {
            return Err(format!("limit must be between 1 and {MAX_FIND_LIMIT}, got {}", self.limit));
        }
        if let Some(sort) = &self.sort {
            for entry in sort {
                if let Some((field, dir)) = entry.iter().find(|(_, d)| !matches!(**d, 1 | -1)) {
                    return Err(format!("sort direction for {field} must be 1 or -1, got {dir}"));
                }
            }
        }
        Ok(())
    }
}

/// One page of find results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindResponse {
    pub results: Vec<JsonValue>,
    /// Documents in this page.
    pub count: usize,
    /// Documents matching the filter, ignoring skip and limit.
    pub total_count: u64,
    pub database_name: String,
    pub collection_name: String,
}
