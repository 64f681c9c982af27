//! Rule-only extraction used before any schema is available.
//!
//! One regular-expression pass pulls a collection from an `in/from the <name>
//! collection` phrase and at most one `with <field> <value>` or
//! `where <field> is <value>` pair. No scoring, no synonyms.

use std::sync::LazyLock;

use regex::Regex;

use crate::query::{Condition, ExecutableQuery, Filter, QueryDescriptor, QueryMeta};
use crate::translator::{classify_intent, normalize};
use crate::types::Value;

/// Limit applied to every fallback query.
pub const FALLBACK_LIMIT: u64 = 100;

static COLLECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:in|from)\s+(?:the\s+)?(\w+)(?:\s+collection)?").expect("static pattern")
});

static FIELD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bwith\s+(\w+)\s+([^,]+?)(?:,|\s+in\s+|$)",
        r#"(?i)\bwhere\s+(\w+)\s+(?:is|==|=)\s+["']?([^"']+?)["']?(?:,|\s+in\s+|$)"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

/// Result of a fallback pass that found a collection phrase.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectOutcome {
    Query(QueryDescriptor),
    /// The named collection is not in the cached list.
    UnknownCollection { name: String, available: Vec<String> },
}

/// Narrow extractor over raw text plus a cached collection list.
#[derive(Debug, Clone)]
pub struct DirectPatternFallback {
    database: String,
    known_collections: Vec<String>,
}

impl DirectPatternFallback {
    /// `known_collections` may be empty, in which case any name is accepted.
    #[must_use]
    pub fn new(database: impl Into<String>, known_collections: Vec<String>) -> Self {
        Self {
            database: database.into(),
            known_collections,
        }
    }

    /// Returns `None` when the text has no collection phrase.
    #[must_use]
    pub fn parse(&self, raw_text: &str) -> Option<DirectOutcome> {
        let caps = COLLECTION.captures(raw_text)?;
        let whole = caps.get(0)?;
        let named = caps.get(1)?.as_str();

        let collection = if self.known_collections.is_empty() {
            named.to_string()
        } else {
            match self
                .known_collections
                .iter()
                .find(|c| c.eq_ignore_ascii_case(named))
            {
                Some(c) => c.clone(),
                None => {
                    return Some(DirectOutcome::UnknownCollection {
                        name: named.to_string(),
                        available: self.known_collections.clone(),
                    })
                }
            }
        };

        let remainder = format!("{} {}", &raw_text[..whole.start()], &raw_text[whole.end()..]);
        let remainder = remainder.trim();

        let mut filter = Filter::new();
        if let Some(pair) = FIELD_PATTERNS.iter().find_map(|re| re.captures(remainder)) {
            let value = pair[2].trim();
            if !value.is_empty() {
                filter.set(&pair[1], Condition::Equals(literal(value)));
            }
        }

        let processed = normalize(raw_text);
        Some(DirectOutcome::Query(QueryDescriptor {
            query: Some(ExecutableQuery {
                database: self.database.clone(),
                collection,
                filter,
                projection: None,
                sort: Vec::new(),
                skip: 0,
                limit: FALLBACK_LIMIT,
            }),
            meta: QueryMeta {
                intent: classify_intent(&processed),
                collection_confidence: 1.0,
                collection_strategy: None,
                original_query: raw_text.to_string(),
                processed_query: processed,
                extractors: vec!["direct".to_string()],
                explicit_limit: false,
                error: None,
            },
        }))
    }
}

/// Numbers and booleans become typed values; everything else stays text with
/// its original case.
fn literal(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if raw.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else {
        Value::String(raw.to_string())
    }
}
