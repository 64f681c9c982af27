//! Limit and sort directives.

use std::sync::LazyLock;

use regex::Regex;

use crate::query::{SortDirection, SortKey};

use super::config::TranslatorConfig;
use super::extract::ExtractionContext;

static LIMIT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(?:limit|top|first)\s+(\d+)\b",
        r"\b(\d+)\s+(?:results|entries|documents|records)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

/// `(field capture, direction capture)` patterns, tried in order.
static SORT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(?:sort|sorted|order|ordered)\s+(?:[a-z_]+\s+)?by\s+([a-z_][a-z0-9_.]*)(?:\s+(asc|ascending|desc|descending)\b)?",
        r"\b(?:in|by)\s+([a-z_][a-z0-9_.]*)\s+(asc|ascending|desc|descending)\b(?:\s+order)?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static DESCENDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdesc(?:ending)?\b").expect("static pattern"));

/// Limit stated in the text, clamped to `max_limit`. A literal `0` is ignored.
#[must_use]
pub fn explicit_limit(text: &str, config: &TranslatorConfig) -> Option<u64> {
    LIMIT_PATTERNS
        .iter()
        .filter_map(|re| re.captures(text))
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .find(|n| *n > 0)
        .map(|n| n.min(config.max_limit))
}

/// Sort clause from `sort by <field> [asc|desc]` phrasing.
///
/// Empty when nothing matches or the field cannot be resolved.
#[must_use]
pub fn resolve_sort(ctx: &ExtractionContext<'_>) -> Vec<SortKey> {
    for re in SORT_PATTERNS.iter() {
        let Some(caps) = re.captures(ctx.text) else {
            continue;
        };
        let Some((field, _)) = ctx.resolve_field(&caps[1]) else {
            continue;
        };
        let descending = match caps.get(2) {
            Some(dir) => dir.as_str().starts_with("desc"),
            None => DESCENDING.is_match(ctx.text),
        };
        return vec![SortKey {
            field: field.to_string(),
            direction: if descending {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            },
        }];
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::LexicalMatcher;
    use crate::query::Intent;
    use crate::schema::{FieldTable, Schema, TypeLabel};

    #[test]
    fn explicit_limits() {
        let config = TranslatorConfig::default();
        assert_eq!(explicit_limit("top 5 users", &config), Some(5));
        assert_eq!(explicit_limit("users limit 7", &config), Some(7));
        assert_eq!(explicit_limit("show 12 records", &config), Some(12));
        assert_eq!(explicit_limit("first 5000 users", &config), Some(1000));
        assert_eq!(explicit_limit("top 0 users", &config), None);
        assert_eq!(explicit_limit("show users", &config), None);
    }

    #[test]
    fn default_limits_by_intent() {
        let config = TranslatorConfig::default();
        assert_eq!(config.default_limit(Intent::Find), 20);
        assert_eq!(config.default_limit(Intent::Count), 1000);
        assert_eq!(config.default_limit(Intent::Aggregate), 50);
    }

    fn sort_for(text: &str) -> Vec<SortKey> {
        let fields: FieldTable = [
            ("fullName".to_string(), TypeLabel::String),
            ("age".to_string(), TypeLabel::Integer),
        ]
        .into_iter()
        .collect();
        let schema = Schema::new().with_collection("users", fields.clone());
        let matcher = LexicalMatcher::default();
        let config = TranslatorConfig::default();
        let ctx = ExtractionContext {
            text,
            collection: "users",
            fields: &fields,
            schema: &schema,
            matcher: &matcher,
            config: &config,
        };
        resolve_sort(&ctx)
    }

    #[test]
    fn sort_directions() {
        assert_eq!(
            sort_for("sort users by age desc"),
            vec![SortKey {
                field: "age".to_string(),
                direction: SortDirection::Descending
            }]
        );
        assert_eq!(
            sort_for("show users ordered by name"),
            vec![SortKey {
                field: "fullName".to_string(),
                direction: SortDirection::Ascending
            }]
        );
        assert_eq!(
            sort_for("users in age descending order"),
            vec![SortKey {
                field: "age".to_string(),
                direction: SortDirection::Descending
            }]
        );
    }

    #[test]
    fn no_sort_without_directive_or_field() {
        assert!(sort_for("show users").is_empty());
        assert!(sort_for("sort users by zzzz").is_empty());
    }
}
