//! Schema-aware natural-language query translator.
//!
//! Translation is a fixed, non-backtracking pipeline:
//!
//! ```text
//! normalize -> intent -> collection -> conditions -> limit -> sort -> assemble
//! ```
//!
//! Low confidence at any stage is carried into the metadata rather than
//! rejected. The only terminal failure is an empty schema, reported through
//! [`QueryMeta::error`](crate::query::QueryMeta::error).

pub mod config;
pub mod directives;
pub mod extract;
pub mod intent;

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::matcher::LexicalMatcher;
use crate::query::{ExecutableQuery, Filter, Intent, QueryDescriptor, QueryMeta};
use crate::schema::{FieldTable, Schema};

pub use config::TranslatorConfig;
pub use extract::{
    default_extractors, ComparisonExtractor, ConditionExtractor, Extraction, ExtractionContext,
    GenericExtractor, InterestExtractor, NameExtractor,
};
pub use intent::classify_intent;

/// Message carried by the error descriptor.
pub const UNRESOLVED_COLLECTION: &str =
    "Could not determine which collection to query. Please specify a collection name in your query.";

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Lowercases, replaces sentence punctuation with spaces, collapses whitespace.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let lowered: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '.' | ',' | ';' | ':' | '!' | '?') { ' ' } else { c })
        .collect();
    WHITESPACE.replace_all(lowered.trim(), " ").into_owned()
}

/// Translates English requests against one immutable [`Schema`].
///
/// Holds no mutable state, so one instance can serve concurrent callers.
pub struct QueryTranslator {
    database: String,
    schema: Arc<Schema>,
    matcher: LexicalMatcher,
    extractors: Vec<Box<dyn ConditionExtractor>>,
    config: TranslatorConfig,
}

impl fmt::Debug for QueryTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTranslator")
            .field("database", &self.database)
            .field("collections", &self.schema.len())
            .field("extractors", &self.extractors)
            .finish_non_exhaustive()
    }
}

impl QueryTranslator {
    /// Translator with the default matcher, config and extractor chain.
    #[must_use]
    pub fn new(database: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self {
            database: database.into(),
            schema,
            matcher: LexicalMatcher::default(),
            extractors: default_extractors(),
            config: TranslatorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: TranslatorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: LexicalMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Replaces the extractor chain. Order is evaluation order.
    #[must_use]
    pub fn with_extractors(mut self, extractors: Vec<Box<dyn ConditionExtractor>>) -> Self {
        self.extractors = extractors;
        self
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Translates `raw_text`. Never panics and never fails outright: an
    /// unresolvable collection yields a descriptor with `query: None` and an
    /// error message.
    #[must_use]
    pub fn translate(&self, raw_text: &str) -> QueryDescriptor {
        let text = normalize(raw_text);
        let intent = classify_intent(&text);

        let Some(resolved) = self.matcher.resolve_collection(&text, &self.schema) else {
            debug!(query = %text, "no collection resolvable");
            return QueryDescriptor {
                query: None,
                meta: QueryMeta {
                    intent,
                    collection_confidence: 0.0,
                    collection_strategy: None,
                    original_query: raw_text.to_string(),
                    processed_query: text,
                    extractors: Vec::new(),
                    explicit_limit: false,
                    error: Some(UNRESOLVED_COLLECTION.to_string()),
                },
            };
        };

        let empty = FieldTable::new();
        let ctx = ExtractionContext {
            text: &text,
            collection: &resolved.collection,
            fields: self.schema.fields(&resolved.collection).unwrap_or(&empty),
            schema: &self.schema,
            matcher: &self.matcher,
            config: &self.config,
        };

        let mut filter = Filter::new();
        let mut fired = Vec::new();
        for extractor in &self.extractors {
            match extractor.extract(&ctx, &mut filter) {
                Extraction::NoMatch => {}
                Extraction::Matched => fired.push(extractor.name().to_string()),
                Extraction::Complete => {
                    fired.push(extractor.name().to_string());
                    break;
                }
            }
        }

        let explicit = directives::explicit_limit(&text, &self.config);
        let limit = explicit.unwrap_or_else(|| self.config.default_limit(intent));
        let sort = directives::resolve_sort(&ctx);

        debug!(
            collection = %resolved.collection,
            confidence = resolved.confidence,
            %intent,
            filter = %filter,
            limit,
            "query translated"
        );

        QueryDescriptor {
            query: Some(ExecutableQuery {
                database: self.database.clone(),
                collection: resolved.collection.clone(),
                filter,
                projection: None,
                sort,
                skip: 0,
                limit,
            }),
            meta: QueryMeta {
                intent,
                collection_confidence: resolved.confidence,
                collection_strategy: Some(resolved.strategy),
                original_query: raw_text.to_string(),
                processed_query: text.clone(),
                extractors: fired,
                explicit_limit: explicit.is_some(),
                error: None,
            },
        }
    }
}
