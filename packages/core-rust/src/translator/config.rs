//! Translator tuning constants.

use serde::{Deserialize, Serialize};

use crate::query::{Intent, MAX_FIND_LIMIT};

/// Limits, thresholds and word lists used by [`QueryTranslator`](super::QueryTranslator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Page size for `find` when the text names no limit.
    pub default_find_limit: u64,
    /// Ceiling for `count`, large enough to count one page of everything.
    pub default_count_limit: u64,
    /// Page size for `aggregate` and `distinct`.
    pub default_other_limit: u64,
    /// Explicit limits in the text are clamped to this.
    pub max_limit: u64,
    /// Minimum matcher score for accepting a field reference.
    pub min_field_confidence: f64,
    /// Words stripped from extracted values.
    pub connective_words: Vec<String>,
    /// Array field names treated as interest/tag lists.
    pub interest_fields: Vec<String>,
    /// Words never taken as field references.
    pub ignored_field_terms: Vec<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            default_find_limit: 20,
            default_count_limit: 1000,
            default_other_limit: 50,
            max_limit: MAX_FIND_LIMIT,
            min_field_confidence: 0.6,
            connective_words: words(&["as", "is", "of", "in", "on", "=", ":"]),
            interest_fields: words(&["interests", "tags", "skills", "hobbies", "preferences", "likes"]),
            ignored_field_terms: words(&[
                "what", "who", "which", "where", "there", "that", "this", "it", "how",
            ]),
        }
    }
}

impl TranslatorConfig {
    /// Default limit for `intent`.
    #[must_use]
    pub fn default_limit(&self, intent: Intent) -> u64 {
        match intent {
            Intent::Count => self.default_count_limit,
            Intent::Find => self.default_find_limit,
            Intent::Aggregate | Intent::Distinct => self.default_other_limit,
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| (*w).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TranslatorConfig::default();
        assert_eq!(config.default_limit(Intent::Find), 20);
        assert_eq!(config.default_limit(Intent::Count), 1000);
        assert_eq!(config.default_limit(Intent::Aggregate), 50);
        assert_eq!(config.default_limit(Intent::Distinct), 50);
        assert_eq!(config.max_limit, 1000);
        assert!((config.min_field_confidence - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config: TranslatorConfig =
            serde_json::from_str(r#"{"default_find_limit": 10}"#).unwrap();
        assert_eq!(config.default_find_limit, 10);
        assert_eq!(config.default_count_limit, 1000);
    }
}
