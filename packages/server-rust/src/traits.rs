use async_trait::async_trait;
use nlq_core::{Document, FindRequest};
use serde_json::{Map, Value as JsonValue};

/// One page of documents plus the number of matches ignoring skip/limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindPage {
    pub documents: Vec<Document>,
    pub total_count: u64,
}

/// Pluggable document database backend.
/// Implementations: in-memory (seeded from JSON), null (tests).
///
/// Failures are `anyhow` errors; typed causes are
/// [`StoreError`](crate::error::StoreError) values inside them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Database this store serves.
    fn database_name(&self) -> &str;

    /// Collection names in store order.
    async fn list_collections(&self) -> anyhow::Result<Vec<String>>;

    /// Up to `max_count` documents in the store's natural order.
    async fn sample(&self, collection: &str, max_count: usize) -> anyhow::Result<Vec<Document>>;

    /// Number of documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Map<String, JsonValue>) -> anyhow::Result<u64>;

    /// Executes a find request.
    async fn find(&self, request: &FindRequest) -> anyhow::Result<FindPage>;
}
