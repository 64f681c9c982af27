//! Intent classification from ordered trigger families.

use std::sync::LazyLock;

use regex::Regex;

use crate::query::Intent;

/// Checked in order; the first family with a hit wins. Count precedes find
/// so "how many users are named x" counts instead of listing.
const FAMILIES: &[(Intent, &str)] = &[
    (Intent::Count, r"\b(?:how many|count|total|number of|tally)\b"),
    (
        Intent::Find,
        r"\b(?:show|find|list|get|give me|display)\b|\b(?:what|who|which)\s+(?:are|is)\b",
    ),
    (Intent::Aggregate, r"\b(?:average|avg|mean|median|sum|group(?:ed)?\s+by)\b"),
    (Intent::Distinct, r"\b(?:distinct|unique|different)\b"),
];

static TRIGGERS: LazyLock<Vec<(Intent, Regex)>> = LazyLock::new(|| {
    FAMILIES
        .iter()
        .map(|(intent, pattern)| (*intent, Regex::new(pattern).expect("static pattern")))
        .collect()
});

/// Classifies normalized text. Unmatched text is a `find`.
#[must_use]
pub fn classify_intent(text: &str) -> Intent {
    TRIGGERS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map_or(Intent::Find, |(intent, _)| *intent)
}
