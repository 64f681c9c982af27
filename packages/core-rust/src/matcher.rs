//! Lexical matching of user terms against collection and field vocabularies.
//!
//! Scores live on a single 0.0 to 1.0 scale. A pair is scored by the first
//! strategy that hits, in this order:
//!
//! | Strategy                         | Score                        |
//! |----------------------------------|------------------------------|
//! | exact (case-insensitive)         | 1.0                          |
//! | declared synonym                 | 0.9 canonical, 0.8 siblings  |
//! | substring containment            | 0.7 + 0.2 × shorter/longer   |
//! | plural/singular variant of above | above × 0.9                  |
//! | edit-distance similarity ≥ cutoff| 0.6                          |
//! | shared `_`/space token           | 0.2                          |
//!
//! [`LexicalMatcher::resolve_collection`] layers positional heuristics on top
//! and short-circuits on the first strategy that produces a collection.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schema::Schema;

pub const EXACT_SCORE: f64 = 1.0;
pub const CANONICAL_SYNONYM_SCORE: f64 = 0.9;
pub const SIBLING_SYNONYM_SCORE: f64 = 0.8;
pub const SUBSTRING_BASE_SCORE: f64 = 0.7;
pub const SUBSTRING_OVERLAP_BONUS: f64 = 0.2;
pub const VARIANT_PENALTY: f64 = 0.9;
pub const FUZZY_SCORE: f64 = 0.6;
pub const TOKEN_OVERLAP_SCORE: f64 = 0.2;

// ---------------------------------------------------------------------------
// Synonyms
// ---------------------------------------------------------------------------

/// Canonical concept to surface synonyms, compared separator-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SynonymTable {
    groups: IndexMap<String, Vec<String>>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SynonymTable {
    /// Table with no groups.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            groups: IndexMap::new(),
        }
    }

    /// Built-in vocabulary for common document fields.
    #[must_use]
    pub fn builtin() -> Self {
        const GROUPS: &[(&str, &[&str])] = &[
            ("name", &["fullname", "full name", "full_name", "username", "user name", "user_name", "alias"]),
            ("email", &["mail", "email address", "e-mail", "emailaddress", "mail address"]),
            ("age", &["years", "years old"]),
            ("id", &["identifier", "_id", "uuid", "userid", "uid"]),
            ("date", &["timestamp", "time", "datetime", "created", "created at", "createdat"]),
            ("user", &["users", "person", "people", "account", "accounts", "profile", "profiles"]),
            ("total", &["count", "number", "sum", "amount"]),
            ("active", &["enabled", "status", "state"]),
            ("interest", &["interests", "hobby", "hobbies", "likes", "preference", "preferences"]),
        ];
        let mut table = Self::empty();
        for (canonical, synonyms) in GROUPS {
            table.add_group(*canonical, synonyms.iter().copied());
        }
        table
    }

    /// Adds (or extends) a group.
    pub fn add_group<I, S>(&mut self, canonical: impl Into<String>, synonyms: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .entry(canonical.into())
            .or_default()
            .extend(synonyms.into_iter().map(Into::into));
    }

    /// Surface synonyms declared for `canonical` (empty when undeclared).
    #[must_use]
    pub fn synonyms_of(&self, canonical: &str) -> &[String] {
        self.groups.get(canonical).map_or(&[], Vec::as_slice)
    }

    /// True when `term` is `canonical` itself or one of its synonyms.
    #[must_use]
    pub fn is_member(&self, canonical: &str, term: &str) -> bool {
        let key = compact(term);
        compact(canonical) == key || self.synonyms_of(canonical).iter().any(|s| compact(s) == key)
    }

    /// Synonym score for a pair, or `None` when no group relates them.
    #[must_use]
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        let (a, b) = (compact(a), compact(b));
        if a == b {
            return None;
        }
        let mut best: Option<f64> = None;
        for (canonical, synonyms) in &self.groups {
            let canonical = compact(canonical);
            let a_syn = synonyms.iter().any(|s| compact(s) == a);
            let b_syn = synonyms.iter().any(|s| compact(s) == b);
            let score = if (canonical == a && b_syn) || (canonical == b && a_syn) {
                CANONICAL_SYNONYM_SCORE
            } else if a_syn && b_syn {
                SIBLING_SYNONYM_SCORE
            } else {
                continue;
            };
            best = Some(best.map_or(score, |s: f64| s.max(score)));
        }
        best
    }
}

/// Lowercase with `_`, `-` and spaces removed.
fn compact(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tuning knobs for [`LexicalMatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Minimum normalized edit-distance similarity for the fuzzy tier, and
    /// minimum score for accepting a fuzzy collection reference.
    pub min_similarity: f64,
    /// Shorter side of a substring match must be at least this many chars.
    pub min_substring_len: usize,
    /// Words that refer to people.
    pub person_terms: Vec<String>,
    /// Collection chosen by the person-word heuristic.
    pub person_collection: String,
    pub synonyms: SynonymTable,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.6,
            min_substring_len: 3,
            person_terms: ["user", "users", "person", "people"]
                .into_iter()
                .map(String::from)
                .collect(),
            person_collection: "users".to_string(),
            synonyms: SynonymTable::builtin(),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One scored candidate from a vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub name: String,
    pub score: f64,
}

/// Which heuristic picked the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStrategy {
    ExplicitReference,
    BareToken,
    FieldOverlap,
    PersonHeuristic,
    FirstCollection,
}

/// Outcome of collection resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMatch {
    pub collection: String,
    pub confidence: f64,
    pub strategy: CollectionStrategy,
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

static PREPOSITIONAL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:in|from|of)\s+(?:the\s+)?([a-z0-9_]+)(?:\s+collection)?")
        .expect("static pattern")
});

static VERB_OBJECT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:find|show|list|get|display|count|sort|how many|give me)\s+(?:me\s+)?(?:all\s+)?(?:the\s+)?([a-z0-9_]+)",
    )
    .expect("static pattern")
});

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9_]+").expect("static pattern"));

/// Scores terms against vocabularies and resolves collections from text.
///
/// Stateless apart from its config; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct LexicalMatcher {
    config: MatcherConfig,
}

impl LexicalMatcher {
    #[must_use]
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    #[must_use]
    pub fn synonyms(&self) -> &SynonymTable {
        &self.config.synonyms
    }

    /// Scores `term` against a single candidate (0.0 when unrelated).
    #[must_use]
    pub fn score(&self, term: &str, candidate: &str) -> f64 {
        let term = term.trim().to_lowercase();
        let candidate = candidate.trim().to_lowercase();
        if term.is_empty() || candidate.is_empty() {
            return 0.0;
        }

        if let Some(score) = self.direct_score(&term, &candidate) {
            return score;
        }

        let variant_best = plural_variants(&term)
            .into_iter()
            .filter_map(|variant| self.direct_score(&variant, &candidate))
            .fold(0.0_f64, f64::max);
        if variant_best > 0.0 {
            return variant_best * VARIANT_PENALTY;
        }

        if strsim::normalized_levenshtein(&term, &candidate) >= self.config.min_similarity {
            return FUZZY_SCORE;
        }

        if tokens_overlap(&term, &candidate) {
            return TOKEN_OVERLAP_SCORE;
        }
        0.0
    }

    /// Exact, synonym and substring tiers.
    fn direct_score(&self, term: &str, candidate: &str) -> Option<f64> {
        if term == candidate {
            return Some(EXACT_SCORE);
        }
        if let Some(score) = self.config.synonyms.score(term, candidate) {
            return Some(score);
        }
        let (shorter, longer) = if term.len() <= candidate.len() {
            (term, candidate)
        } else {
            (candidate, term)
        };
        if shorter.chars().count() >= self.config.min_substring_len && longer.contains(shorter) {
            #[allow(clippy::cast_precision_loss)]
            let ratio = shorter.chars().count() as f64 / longer.chars().count() as f64;
            return Some(SUBSTRING_BASE_SCORE + SUBSTRING_OVERLAP_BONUS * ratio);
        }
        None
    }

    /// Every vocabulary entry with a non-zero score, best first.
    ///
    /// Ties keep vocabulary order.
    #[must_use]
    pub fn rank<'a, I>(&self, term: &str, vocabulary: I) -> Vec<MatchCandidate>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ranked: Vec<MatchCandidate> = vocabulary
            .into_iter()
            .map(|name| MatchCandidate {
                name: name.to_string(),
                score: self.score(term, name),
            })
            .filter(|c| c.score > 0.0)
            .collect();
        // sort_by is stable, so equal scores stay in vocabulary order.
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// Top-ranked candidate scoring at least `min_score`.
    #[must_use]
    pub fn best<'a, I>(&self, term: &str, vocabulary: I, min_score: f64) -> Option<MatchCandidate>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.rank(term, vocabulary)
            .into_iter()
            .next()
            .filter(|c| c.score >= min_score)
    }

    /// Picks the collection `text` refers to. `text` should already be
    /// normalized (lowercase, punctuation stripped).
    ///
    /// Returns `None` only for an empty schema.
    #[must_use]
    pub fn resolve_collection(&self, text: &str, schema: &Schema) -> Option<CollectionMatch> {
        let first = schema.collection_names().next()?;

        let found = self
            .explicit_reference(text, schema)
            .or_else(|| Self::bare_token(text, schema))
            .or_else(|| Self::field_overlap(text, schema))
            .or_else(|| self.person_heuristic(text, schema))
            .unwrap_or_else(|| CollectionMatch {
                collection: first.to_string(),
                confidence: 0.2,
                strategy: CollectionStrategy::FirstCollection,
            });
        tracing::debug!(
            collection = %found.collection,
            confidence = found.confidence,
            strategy = ?found.strategy,
            "collection resolved"
        );
        Some(found)
    }

    fn explicit_reference(&self, text: &str, schema: &Schema) -> Option<CollectionMatch> {
        let references: Vec<&str> = PREPOSITIONAL_REF
            .captures_iter(text)
            .chain(VERB_OBJECT_REF.captures_iter(text))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();

        if let Some(name) = references.iter().find_map(|r| schema.find_collection(r)) {
            return Some(CollectionMatch {
                collection: name.to_string(),
                confidence: 0.9,
                strategy: CollectionStrategy::ExplicitReference,
            });
        }
        references.iter().find_map(|r| {
            self.best(r, schema.collection_names(), self.config.min_similarity)
                .map(|c| CollectionMatch {
                    collection: c.name,
                    confidence: 0.8,
                    strategy: CollectionStrategy::ExplicitReference,
                })
        })
    }

    fn bare_token(text: &str, schema: &Schema) -> Option<CollectionMatch> {
        let tokens: Vec<&str> = WORD.find_iter(text).map(|m| m.as_str()).collect();
        let has = |word: &str| tokens.iter().any(|t| t.eq_ignore_ascii_case(word));

        if let Some(name) = schema.collection_names().find(|name| has(name)) {
            return Some(CollectionMatch {
                collection: name.to_string(),
                confidence: 0.7,
                strategy: CollectionStrategy::BareToken,
            });
        }
        schema
            .collection_names()
            .find(|name| plural_variants(&name.to_lowercase()).iter().any(|v| has(v)))
            .map(|name| CollectionMatch {
                collection: name.to_string(),
                confidence: 0.65,
                strategy: CollectionStrategy::BareToken,
            })
    }

    fn field_overlap(text: &str, schema: &Schema) -> Option<CollectionMatch> {
        let mut best: Option<(&str, f64)> = None;
        for (name, fields) in schema.iter() {
            if fields.is_empty() {
                continue;
            }
            let hits = fields
                .keys()
                .filter(|field| text.contains(field.to_lowercase().as_str()))
                .count();
            #[allow(clippy::cast_precision_loss)]
            let ratio = hits as f64 / fields.len() as f64;
            if ratio > best.map_or(0.0, |(_, r)| r) {
                best = Some((name, ratio));
            }
        }
        best.map(|(name, ratio)| CollectionMatch {
            collection: name.to_string(),
            confidence: 0.5 * ratio,
            strategy: CollectionStrategy::FieldOverlap,
        })
    }

    fn person_heuristic(&self, text: &str, schema: &Schema) -> Option<CollectionMatch> {
        let mentions_person = WORD
            .find_iter(text)
            .any(|m| self.config.person_terms.iter().any(|p| p == m.as_str()));
        if !mentions_person {
            return None;
        }
        schema
            .find_collection(&self.config.person_collection)
            .map(|name| CollectionMatch {
                collection: name.to_string(),
                confidence: 0.4,
                strategy: CollectionStrategy::PersonHeuristic,
            })
    }
}

/// Singular/plural spellings of `term` obtained by stripping or appending `s`.
#[must_use]
pub fn plural_variants(term: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(2);
    if let Some(stem) = term.strip_suffix('s') {
        if stem.len() >= 2 {
            variants.push(stem.to_string());
        }
    } else {
        variants.push(format!("{term}s"));
    }
    variants
}

fn tokens_overlap(a: &str, b: &str) -> bool {
    let split = |s: &str| -> Vec<String> {
        s.split(['_', ' '])
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    };
    let left = split(a);
    let right = split(b);
    left.iter().any(|t| right.contains(t))
}
