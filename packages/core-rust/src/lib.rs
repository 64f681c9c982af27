//! `nlq` Core: document value model, schema inference, lexical matching, and
//! natural-language query translation.
//!
//! Everything in this crate is synchronous and pure. I/O (sampling documents,
//! executing queries) lives in `nlq-server`.

pub mod classifier;
pub mod fallback;
pub mod matcher;
pub mod query;
pub mod schema;
pub mod traits;
pub mod translator;
pub mod types;

pub use classifier::FieldTypeClassifier;
pub use fallback::{DirectOutcome, DirectPatternFallback};
pub use matcher::{CollectionMatch, CollectionStrategy, LexicalMatcher, MatchCandidate, MatcherConfig, SynonymTable};
pub use query::{
    Branch, Comparison, Condition, ExecutableQuery, Filter, FindRequest, FindResponse, Intent,
    QueryDescriptor, QueryMeta, SortDirection, SortKey,
};
pub use schema::{CollectionSchema, DatabaseSchema, FieldTable, Schema, TypeLabel};
pub use traits::QueryEnhancer;
pub use translator::{QueryTranslator, TranslatorConfig};
pub use types::{Document, Value};
