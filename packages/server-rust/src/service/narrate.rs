//! One-paragraph English summaries of executed queries.

use nlq_core::{Comparison, Condition, Filter, Intent};

/// Result sets up to this size are described as "details".
const DETAIL_THRESHOLD: u64 = 3;

fn comparison_phrase(op: Comparison) -> &'static str {
    match op {
        Comparison::GreaterThan => "is greater than",
        Comparison::GreaterOrEqual => "is at least",
        Comparison::LessThan => "is less than",
        Comparison::LessOrEqual => "is at most",
        Comparison::NotEqual => "is not",
    }
}

fn describe_condition(field: &str, condition: &Condition) -> String {
    match condition {
        Condition::Equals(v) => format!("{field} is '{v}'"),
        Condition::CaseInsensitiveEquals(s) => format!("{field} is '{s}'"),
        Condition::Contains(v) => format!("{field} contains '{v}'"),
        Condition::CaseInsensitiveContains(s) => format!("{field} contains '{s}'"),
        Condition::MatchesAnyOf(vs) => {
            let quoted: Vec<String> = vs.iter().map(|v| format!("'{v}'")).collect();
            format!("{field} is one of {}", quoted.join(", "))
        }
        Condition::Compare(op, v) => format!("{field} {} '{v}'", comparison_phrase(*op)),
        Condition::Range(bounds) => {
            let clauses: Vec<String> = bounds
                .iter()
                .map(|(op, v)| format!("{} '{v}'", comparison_phrase(*op)))
                .collect();
            format!("{field} {}", clauses.join(" and "))
        }
    }
}

/// Filter as a clause, or `None` for an empty filter. Conjuncts are joined
/// with commas, and the alternatives of a disjunction with ` or `.
#[must_use]
pub fn describe_filter(filter: &Filter) -> Option<String> {
    if filter.is_empty() {
        return None;
    }
    let mut parts: Vec<String> = filter
        .conditions()
        .map(|(field, condition)| describe_condition(field, condition))
        .collect();
    if !filter.any_of().is_empty() {
        let alternatives: Vec<String> = filter
            .any_of()
            .iter()
            .map(|b| describe_condition(&b.field, &b.condition))
            .collect();
        parts.push(alternatives.join(" or "));
    }
    Some(parts.join(", "))
}

/// Explains a query result.
///
/// `total` is the number of matching documents, `returned` the size of the
/// page actually fetched.
#[must_use]
pub fn narrate(intent: Intent, collection: &str, filter: &Filter, total: u64, returned: usize, limit: u64) -> String {
    let mut text = if intent == Intent::Count {
        format!("There are {total} document(s) in the {collection} collection")
    } else {
        format!("Found {total} document(s) in the {collection} collection")
    };
    if let Some(clause) = describe_filter(filter) {
        text.push_str(" where ");
        text.push_str(&clause);
    }
    text.push('.');

    if intent != Intent::Count {
        if total == 0 {
            text.push_str(&format!(
                " No matching documents were found in the {collection} collection with your criteria."
            ));
        } else if total <= DETAIL_THRESHOLD {
            text.push_str(" Here are the details of the matching document(s).");
        } else {
            let shown = (returned as u64).min(limit);
            text.push_str(&format!(" Showing {shown} out of {total} matching documents."));
        }
    }
    text
}
