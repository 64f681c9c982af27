//! Filter condition extractors.
//!
//! Extractors run as a chain against the normalized text. Specialized,
//! high-precision extractors come first and may end the chain by returning
//! [`Extraction::Complete`]; the generic `field is value` extractor runs last.

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::matcher::LexicalMatcher;
use crate::query::{Branch, Comparison, Condition, Filter};
use crate::schema::{FieldTable, Schema, TypeLabel};
use crate::types::Value;

use super::config::TranslatorConfig;

/// Value capture: words separated by single spaces, taken lazily.
const VALUE: &str = r"([a-z0-9_@'\-]+(?:\s+[a-z0-9_@'\-]+)*?)";

/// Where a captured value ends.
const TERMINATOR: &str =
    r"(?:\s+(?:and|or|in|from|with|where|who|whose|that|sorted|sort|order|ordered|limit|top)\b|\s*$)";

/// Connectives and sort or limit words; never the start of a value.
const DIRECTIVE_WORDS: &[&str] = &[
    "and", "or", "by", "sort", "sorted", "order", "ordered", "limit", "top", "asc", "ascending",
    "desc", "descending",
];

/// Identifier-shaped field reference.
const FIELD: &str = r"([a-z_][a-z0-9_]*)";

fn compile(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Read-only view handed to each extractor.
pub struct ExtractionContext<'a> {
    /// Normalized query text.
    pub text: &'a str,
    pub collection: &'a str,
    pub fields: &'a FieldTable,
    pub schema: &'a Schema,
    pub matcher: &'a LexicalMatcher,
    pub config: &'a TranslatorConfig,
}

impl<'a> ExtractionContext<'a> {
    /// Best field for `term`, scored against full paths and their leaf segment.
    ///
    /// Returns `None` below the configured field confidence.
    #[must_use]
    pub fn resolve_field(&self, term: &str) -> Option<(&'a str, f64)> {
        let mut best: Option<(&'a str, f64)> = None;
        for name in self.fields.keys() {
            let leaf = name.rsplit('.').next().unwrap_or(name);
            let score = self.matcher.score(term, name).max(self.matcher.score(term, leaf));
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((name.as_str(), score));
            }
        }
        best.filter(|(_, s)| *s >= self.config.min_field_confidence)
    }

    /// True when `raw` names a collection in the schema.
    #[must_use]
    pub fn is_collection_name(&self, raw: &str) -> bool {
        self.schema.find_collection(raw.trim()).is_some()
    }

    /// Drops connective words and collapses whitespace.
    #[must_use]
    pub fn clean_value(&self, raw: &str) -> String {
        raw.split_whitespace()
            .filter(|w| !self.config.connective_words.iter().any(|c| c == w))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn label(&self, field: &str) -> &TypeLabel {
        self.fields.get(field).unwrap_or(&TypeLabel::Mixed)
    }

    /// Condition for `field = value`, shaped by the field's inferred type.
    ///
    /// Text fields and string arrays match case-insensitively: anchored for a
    /// single token, as a substring once the value contains whitespace.
    #[must_use]
    pub fn shape(&self, field: &str, value: &str) -> Condition {
        let label = self.label(field);
        if label.is_textual() || label.is_string_array() {
            return if value.contains(char::is_whitespace) {
                Condition::CaseInsensitiveContains(value.to_string())
            } else {
                Condition::CaseInsensitiveEquals(value.to_string())
            };
        }
        match label {
            TypeLabel::Array(inner) => {
                let element = inner.as_deref().unwrap_or(&TypeLabel::String);
                Condition::Contains(parse_scalar(element, value))
            }
            other => Condition::Equals(parse_scalar(other, value)),
        }
    }

    /// Anchored equality, case-insensitive for text.
    #[must_use]
    pub fn equality(&self, field: &str, value: &str) -> Condition {
        let label = self.label(field);
        if label.is_textual() || label.is_string_array() {
            Condition::CaseInsensitiveEquals(value.to_string())
        } else {
            Condition::Equals(parse_scalar(label, value))
        }
    }
}

/// Parses `raw` into the value type `label` calls for, keeping the text when
/// it does not parse.
#[must_use]
pub fn parse_scalar(label: &TypeLabel, raw: &str) -> Value {
    let parsed = match label {
        TypeLabel::Integer => raw
            .parse::<i64>()
            .map(Value::Int)
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(Value::Float)),
        TypeLabel::Double => raw.parse::<f64>().ok().map(Value::Float),
        TypeLabel::Boolean => match raw {
            "true" | "yes" => Some(Value::Bool(true)),
            "false" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_string()))
}

// ---------------------------------------------------------------------------
// Extractor chain
// ---------------------------------------------------------------------------

/// What an extractor did to the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// Nothing recognized; continue the chain.
    NoMatch,
    /// Conditions added; continue the chain.
    Matched,
    /// Conditions added; stop the chain.
    Complete,
}

/// One link of the condition-extraction chain.
pub trait ConditionExtractor: Send + Sync {
    /// Identifier recorded in query metadata.
    fn name(&self) -> &'static str;

    fn extract(&self, ctx: &ExtractionContext<'_>, filter: &mut Filter) -> Extraction;
}

impl fmt::Debug for dyn ConditionExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Interest, name, comparison, then generic.
#[must_use]
pub fn default_extractors() -> Vec<Box<dyn ConditionExtractor>> {
    vec![
        Box::new(InterestExtractor),
        Box::new(NameExtractor),
        Box::new(ComparisonExtractor),
        Box::new(GenericExtractor),
    ]
}

// ---------------------------------------------------------------------------
// Interest
// ---------------------------------------------------------------------------

static INTEREST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\binterests?\s+(?:of|in|on)\s+([a-z0-9_]+)".to_string(),
        r"\binterested\s+(?:in|on)\s+([a-z0-9_]+)".to_string(),
        r"\bhobb(?:y|ies)\s+(?:of|in|is|are)\s+([a-z0-9_]+)".to_string(),
        r"\blikes?\s+([a-z0-9_]+)".to_string(),
        r"\bknows?\s+([a-z0-9_]+)".to_string(),
    ])
});

/// Words that can follow an interest phrase without naming an interest.
const NON_VALUES: &[&str] = &[
    "the", "a", "an", "any", "some", "all", "not", "in", "from", "with", "where", "who", "whose",
    "that", "first", "last",
];

/// `interested in x`, `with interests in x`, `likes x`: membership on an
/// interest-like array field.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterestExtractor;

impl InterestExtractor {
    fn field<'a>(ctx: &ExtractionContext<'a>) -> Option<&'a str> {
        ctx.fields
            .iter()
            .filter(|(_, label)| label.is_array())
            .map(|(name, _)| name.as_str())
            .find(|name| {
                let leaf = name.rsplit('.').next().unwrap_or(name).to_lowercase();
                ctx.config.interest_fields.iter().any(|f| *f == leaf)
                    || ctx.matcher.synonyms().is_member("interest", &leaf)
            })
    }
}

impl ConditionExtractor for InterestExtractor {
    fn name(&self) -> &'static str {
        "interest"
    }

    fn extract(&self, ctx: &ExtractionContext<'_>, filter: &mut Filter) -> Extraction {
        let Some(field) = Self::field(ctx) else {
            return Extraction::NoMatch;
        };
        for re in INTEREST_PATTERNS.iter() {
            let Some(caps) = re.captures(ctx.text) else {
                continue;
            };
            let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            // "sort by interests desc" names a sort key.
            if ctx.text[..whole.start()].split_whitespace().last() == Some("by") {
                continue;
            }
            let value = value.as_str();
            if NON_VALUES.contains(&value)
                || DIRECTIVE_WORDS.contains(&value)
                || ctx.is_collection_name(value)
            {
                continue;
            }
            filter.set(field, Condition::Contains(Value::from(value)));
            return Extraction::Complete;
        }
        Extraction::NoMatch
    }
}

// ---------------------------------------------------------------------------
// Name
// ---------------------------------------------------------------------------

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        format!(
            r"\b(?:name|fullname|full\s+name|full_name|username|user\s+name|user_name|display\s+name)\s+(?:(?:as|is|=|:)\s*)?{VALUE}{TERMINATOR}"
        ),
        format!(r"\bnamed\s+{VALUE}{TERMINATOR}"),
        format!(r"\bcalled\s+{VALUE}{TERMINATOR}"),
    ])
});

/// `named x`, `with name x`: equality on the name-like fields, as a
/// disjunction when there are several.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameExtractor;

impl NameExtractor {
    fn fields<'a>(ctx: &ExtractionContext<'a>) -> Vec<&'a str> {
        ctx.fields
            .iter()
            .filter(|(_, label)| label.is_textual() || label.is_string_array())
            .map(|(name, _)| name.as_str())
            .filter(|name| {
                let leaf = name.rsplit('.').next().unwrap_or(name).to_lowercase();
                leaf.contains("name")
                    || leaf.contains("user")
                    || ctx.matcher.synonyms().is_member("name", &leaf)
            })
            .collect()
    }

    fn value(ctx: &ExtractionContext<'_>, caps: &Captures<'_>) -> Option<String> {
        let whole = caps.get(0)?;
        // "sort by name desc" is a sort directive, not a name condition.
        if ctx.text[..whole.start()].split_whitespace().last() == Some("by") {
            return None;
        }
        let value = ctx.clean_value(caps.get(1)?.as_str());
        (!value.is_empty() && !ctx.is_collection_name(&value)).then_some(value)
    }
}

impl ConditionExtractor for NameExtractor {
    fn name(&self) -> &'static str {
        "name"
    }

    fn extract(&self, ctx: &ExtractionContext<'_>, filter: &mut Filter) -> Extraction {
        let fields = Self::fields(ctx);
        if fields.is_empty() {
            return Extraction::NoMatch;
        }
        let Some(value) = NAME_PATTERNS
            .iter()
            .find_map(|re| re.captures(ctx.text).and_then(|c| Self::value(ctx, &c)))
        else {
            return Extraction::NoMatch;
        };

        if let [field] = fields.as_slice() {
            filter.set(*field, ctx.equality(field, &value));
        } else {
            filter.set_any_of(
                fields
                    .iter()
                    .map(|field| Branch {
                        field: (*field).to_string(),
                        condition: ctx.equality(field, &value),
                    })
                    .collect(),
            );
        }
        Extraction::Complete
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

const COMPARATORS: &str = "greater than|more than|higher than|larger than|above|over|at least|less than|lower than|smaller than|fewer than|below|under|at most";

static EXPLICIT_COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b{FIELD}\s+(?:(?:is|of)\s+)?({COMPARATORS})\s+(-?\d+(?:\.\d+)?)\b"
    ))
    .expect("static pattern")
});

static AGE_COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(older|younger)\s+than\s+(\d+(?:\.\d+)?)\b").expect("static pattern")
});

static NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b{FIELD}\s+is\s+not\s+{VALUE}{TERMINATOR}")).expect("static pattern")
});

fn comparison_for(phrase: &str) -> Comparison {
    match phrase {
        "at least" => Comparison::GreaterOrEqual,
        "at most" => Comparison::LessOrEqual,
        "less than" | "lower than" | "smaller than" | "fewer than" | "below" | "under"
        | "younger" => Comparison::LessThan,
        _ => Comparison::GreaterThan,
    }
}

/// `age over 30`, `older than 30`, `status is not active`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonExtractor;

impl ComparisonExtractor {
    fn numeric_field<'a>(ctx: &ExtractionContext<'a>, term: &str) -> Option<&'a str> {
        if ctx.config.ignored_field_terms.iter().any(|t| t == term) {
            return None;
        }
        ctx.resolve_field(term)
            .map(|(field, _)| field)
            .filter(|field| ctx.fields.get(*field).is_some_and(TypeLabel::is_numeric))
    }
}

impl ConditionExtractor for ComparisonExtractor {
    fn name(&self) -> &'static str {
        "comparison"
    }

    fn extract(&self, ctx: &ExtractionContext<'_>, filter: &mut Filter) -> Extraction {
        let mut outcome = Extraction::NoMatch;

        for caps in EXPLICIT_COMPARISON.captures_iter(ctx.text) {
            let Some(field) = Self::numeric_field(ctx, &caps[1]) else {
                continue;
            };
            let value = parse_scalar(ctx.label(field), &caps[3]);
            filter.constrain(field, comparison_for(&caps[2]), value);
            outcome = Extraction::Matched;
        }

        if let Some(caps) = AGE_COMPARISON.captures(ctx.text) {
            if let Some(field) = Self::numeric_field(ctx, "age") {
                let value = parse_scalar(ctx.label(field), &caps[2]);
                filter.constrain(field, comparison_for(&caps[1]), value);
                outcome = Extraction::Matched;
            }
        }

        for caps in NEGATION.captures_iter(ctx.text) {
            let term = &caps[1];
            if ctx.config.ignored_field_terms.iter().any(|t| t == term) {
                continue;
            }
            let Some((field, _)) = ctx.resolve_field(term) else {
                continue;
            };
            let value = ctx.clean_value(&caps[2]);
            if value.is_empty() {
                continue;
            }
            let value = parse_scalar(ctx.label(field), &value);
            filter.constrain(field, Comparison::NotEqual, value);
            outcome = Extraction::Matched;
        }

        outcome
    }
}

// ---------------------------------------------------------------------------
// Generic
// ---------------------------------------------------------------------------

static GENERIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        format!(r"\b{FIELD}\s+is\s+{VALUE}{TERMINATOR}"),
        format!(r"\b{FIELD}\s*=\s*{VALUE}{TERMINATOR}"),
        format!(r"\b{FIELD}\s+equals?\s+{VALUE}{TERMINATOR}"),
        format!(r"\bwith\s+{FIELD}\s+{VALUE}{TERMINATOR}"),
    ])
});

/// `field is value`, `field = value`, `with field value` anywhere in the text.
///
/// Matches accumulate; a later match for the same field replaces an earlier
/// one. Fields already set by an earlier extractor are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericExtractor;

impl ConditionExtractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn extract(&self, ctx: &ExtractionContext<'_>, filter: &mut Filter) -> Extraction {
        let preset: Vec<String> = filter.conditions().map(|(f, _)| f.to_string()).collect();
        let mut outcome = Extraction::NoMatch;

        for re in GENERIC_PATTERNS.iter() {
            for caps in re.captures_iter(ctx.text) {
                let term = &caps[1];
                let raw = &caps[2];
                let opener = raw.split_whitespace().next().unwrap_or_default();
                if ctx.config.ignored_field_terms.iter().any(|t| t == term)
                    || DIRECTIVE_WORDS.contains(&opener)
                    || raw.contains("collection")
                    || ctx.is_collection_name(term)
                {
                    continue;
                }
                let value = ctx.clean_value(raw);
                if value.is_empty() || ctx.is_collection_name(&value) {
                    continue;
                }
                let Some((field, _)) = ctx.resolve_field(term) else {
                    continue;
                };
                if preset.iter().any(|p| p == field) {
                    continue;
                }
                filter.set(field, ctx.shape(field, &value));
                outcome = Extraction::Matched;
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_fields() -> FieldTable {
        [
            ("fullName", TypeLabel::String),
            ("age", TypeLabel::Integer),
            ("interests", TypeLabel::array_of(TypeLabel::String)),
            ("active", TypeLabel::Boolean),
            ("city", TypeLabel::String),
        ]
        .into_iter()
        .map(|(n, t)| (n.to_string(), t))
        .collect()
    }

    fn run(extractor: &dyn ConditionExtractor, text: &str, fields: &FieldTable) -> (Filter, Extraction) {
        let schema = Schema::new()
            .with_collection("users", fields.clone())
            .with_collection("orders", FieldTable::new());
        let matcher = LexicalMatcher::default();
        let config = TranslatorConfig::default();
        let ctx = ExtractionContext {
            text,
            collection: "users",
            fields,
            schema: &schema,
            matcher: &matcher,
            config: &config,
        };
        let mut filter = Filter::new();
        let outcome = extractor.extract(&ctx, &mut filter);
        (filter, outcome)
    }

    #[test]
    fn interest_membership() {
        let (filter, outcome) = run(&InterestExtractor, "find users interested in chess", &users_fields());
        assert_eq!(outcome, Extraction::Complete);
        assert_eq!(filter.get("interests"), Some(&Condition::Contains(Value::from("chess"))));
    }

    #[test]
    fn interest_needs_a_preposition() {
        for text in [
            "sort users by interests desc",
            "find users with interests and age is 30",
            "sort by likes desc",
        ] {
            let (filter, outcome) = run(&InterestExtractor, text, &users_fields());
            assert_eq!(outcome, Extraction::NoMatch, "{text}");
            assert!(filter.is_empty(), "{text}");
        }

        let (filter, _) = run(&InterestExtractor, "people who like hiking", &users_fields());
        assert_eq!(filter.get("interests"), Some(&Condition::Contains(Value::from("hiking"))));
    }

    #[test]
    fn interest_needs_an_array_field() {
        let mut fields = users_fields();
        fields.shift_remove("interests");
        let (filter, outcome) = run(&InterestExtractor, "users interested in chess", &fields);
        assert_eq!(outcome, Extraction::NoMatch);
        assert!(filter.is_empty());
    }

    #[test]
    fn single_name_field_gets_equality() {
        let (filter, outcome) = run(&NameExtractor, "show users named ada lovelace", &users_fields());
        assert_eq!(outcome, Extraction::Complete);
        assert_eq!(
            filter.get("fullName"),
            Some(&Condition::CaseInsensitiveEquals("ada lovelace".to_string()))
        );
    }

    #[test]
    fn several_name_fields_get_a_disjunction() {
        let mut fields = users_fields();
        fields.insert("username".to_string(), TypeLabel::String);
        let (filter, _) = run(&NameExtractor, "find users called ada in users", &fields);
        let branches: Vec<&str> = filter.any_of().iter().map(|b| b.field.as_str()).collect();
        assert_eq!(branches, vec!["fullName", "username"]);
        assert!(filter
            .any_of()
            .iter()
            .all(|b| b.condition == Condition::CaseInsensitiveEquals("ada".to_string())));
    }

    #[test]
    fn sort_by_name_is_not_a_name_condition() {
        let (filter, outcome) = run(&NameExtractor, "sort users by name desc", &users_fields());
        assert_eq!(outcome, Extraction::NoMatch);
        assert!(filter.is_empty());
    }

    #[test]
    fn generic_shapes_by_type() {
        let (filter, outcome) = run(
            &GenericExtractor,
            "users where age is 36 and active is true and city is new york",
            &users_fields(),
        );
        assert_eq!(outcome, Extraction::Matched);
        assert_eq!(filter.get("age"), Some(&Condition::Equals(Value::Int(36))));
        assert_eq!(filter.get("active"), Some(&Condition::Equals(Value::Bool(true))));
        assert_eq!(
            filter.get("city"),
            Some(&Condition::CaseInsensitiveContains("new york".to_string()))
        );
    }

    #[test]
    fn generic_string_array_single_token_is_anchored() {
        let (filter, _) = run(&GenericExtractor, "users with interests hiking", &users_fields());
        assert_eq!(
            filter.get("interests"),
            Some(&Condition::CaseInsensitiveEquals("hiking".to_string()))
        );
    }

    #[test]
    fn generic_later_match_overwrites() {
        let (filter, _) = run(&GenericExtractor, "age is 30 and age = 31", &users_fields());
        assert_eq!(filter.get("age"), Some(&Condition::Equals(Value::Int(31))));
    }

    #[test]
    fn generic_skips_collection_references() {
        let (filter, outcome) = run(
            &GenericExtractor,
            "what is in the users collection",
            &users_fields(),
        );
        assert_eq!(outcome, Extraction::NoMatch);
        assert!(filter.is_empty());
    }

    #[test]
    fn comparisons() {
        let (filter, outcome) = run(
            &ComparisonExtractor,
            "users with age over 30 and city is not oslo",
            &users_fields(),
        );
        assert_eq!(outcome, Extraction::Matched);
        assert_eq!(
            filter.get("age"),
            Some(&Condition::Compare(Comparison::GreaterThan, Value::Int(30)))
        );
        assert_eq!(
            filter.get("city"),
            Some(&Condition::Compare(Comparison::NotEqual, Value::from("oslo")))
        );

        let (filter, _) = run(&ComparisonExtractor, "people younger than 25", &users_fields());
        assert_eq!(
            filter.get("age"),
            Some(&Condition::Compare(Comparison::LessThan, Value::Int(25)))
        );
    }

    #[test]
    fn comparisons_on_one_field_form_a_range() {
        let (filter, _) = run(
            &ComparisonExtractor,
            "users with age over 30 and age under 50",
            &users_fields(),
        );
        assert_eq!(
            filter.get("age"),
            Some(&Condition::Range(vec![
                (Comparison::GreaterThan, Value::Int(30)),
                (Comparison::LessThan, Value::Int(50)),
            ]))
        );
    }

    #[test]
    fn comparison_needs_numeric_field() {
        let (filter, outcome) = run(&ComparisonExtractor, "city over 30", &users_fields());
        assert_eq!(outcome, Extraction::NoMatch);
        assert!(filter.is_empty());
    }

    #[test]
    fn parse_scalar_falls_back_to_text() {
        assert_eq!(parse_scalar(&TypeLabel::Integer, "12"), Value::Int(12));
        assert_eq!(parse_scalar(&TypeLabel::Integer, "1.5"), Value::Float(1.5));
        assert_eq!(parse_scalar(&TypeLabel::Double, "x"), Value::from("x"));
        assert_eq!(parse_scalar(&TypeLabel::Boolean, "no"), Value::Bool(false));
        assert_eq!(parse_scalar(&TypeLabel::String, "12"), Value::from("12"));
    }
}
