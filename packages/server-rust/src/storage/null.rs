//! Empty [`DocumentStore`] implementation.
//!
//! [`NullStore`] has no collections. Reads succeed with empty results, which
//! makes it the fallback when no seed data is configured.

use async_trait::async_trait;
use nlq_core::{Document, FindRequest};
use serde_json::{Map, Value as JsonValue};

use crate::traits::{DocumentStore, FindPage};

/// Store with no collections.
pub struct NullStore {
    database: String,
}

impl NullStore {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
        }
    }
}

#[async_trait]
impl DocumentStore for NullStore {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn list_collections(&self) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn sample(&self, _collection: &str, _max_count: usize) -> anyhow::Result<Vec<Document>> {
        Ok(Vec::new())
    }

    async fn count(&self, _collection: &str, _filter: &Map<String, JsonValue>) -> anyhow::Result<u64> {
        Ok(0)
    }

    async fn find(&self, _request: &FindRequest) -> anyhow::Result<FindPage> {
        Ok(FindPage::default())
    }
}
