//! Schema inference: sample each collection, classify the sample.
//!
//! Sampling takes the first documents in store order, so the inferred schema
//! is biased toward whatever order the store returns by default (typically
//! insertion order). Failures and timeouts never escape: an affected
//! collection reports an empty field table and a failed collection listing
//! reports an empty database.

use std::sync::Arc;
use std::time::Duration;

use nlq_core::{CollectionSchema, DatabaseSchema, FieldTypeClassifier};
use serde_json::Map;
use tracing::{debug, warn};

use crate::traits::DocumentStore;

/// Default number of documents sampled per collection.
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

/// Default bound on sampling a single collection.
pub const DEFAULT_SAMPLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Samples collections from a [`DocumentStore`] and classifies their fields.
#[derive(Debug, Clone)]
pub struct SchemaInferenceEngine {
    classifier: FieldTypeClassifier,
    sample_size: usize,
    timeout: Duration,
    concurrent: bool,
}

impl Default for SchemaInferenceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE, DEFAULT_SAMPLE_TIMEOUT)
    }
}

impl SchemaInferenceEngine {
    #[must_use]
    pub fn new(sample_size: usize, timeout: Duration) -> Self {
        Self {
            classifier: FieldTypeClassifier::default(),
            sample_size,
            timeout,
            concurrent: true,
        }
    }

    /// Whether [`infer_database`](Self::infer_database) samples collections
    /// in parallel tasks.
    #[must_use]
    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: FieldTypeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Infers one collection's schema.
    ///
    /// An empty collection reports `sample_size` and `documents_sampled` of
    /// zero. Store failures and timeouts report an empty field table.
    pub async fn infer(&self, store: &dyn DocumentStore, collection: &str) -> CollectionSchema {
        match tokio::time::timeout(self.timeout, self.sample_collection(store, collection)).await {
            Ok(Ok(schema)) => schema,
            Ok(Err(err)) => {
                warn!(collection, error = %err, "schema sampling failed");
                CollectionSchema::empty(collection)
            }
            Err(_elapsed) => {
                warn!(
                    collection,
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "schema sampling timed out"
                );
                CollectionSchema::empty(collection)
            }
        }
    }

    async fn sample_collection(
        &self,
        store: &dyn DocumentStore,
        collection: &str,
    ) -> anyhow::Result<CollectionSchema> {
        let total = store.count(collection, &Map::new()).await?;
        if total == 0 {
            return Ok(CollectionSchema::empty(collection));
        }
        let samples = store.sample(collection, self.sample_size).await?;
        let fields = self.classifier.classify(&samples);
        debug!(collection, documents = samples.len(), fields = fields.len(), "collection classified");
        Ok(CollectionSchema {
            collection_name: collection.to_string(),
            fields,
            sample_size: self.sample_size,
            documents_sampled: samples.len(),
        })
    }

    /// Infers every collection, or only `collection_filter` when given.
    ///
    /// Collections are reported in the store's listing order.
    pub async fn infer_database(
        &self,
        store: Arc<dyn DocumentStore>,
        collection_filter: Option<&str>,
    ) -> DatabaseSchema {
        let database_name = store.database_name().to_string();
        let names = match collection_filter {
            Some(name) => vec![name.to_string()],
            None => match store.list_collections().await {
                Ok(names) => names,
                Err(err) => {
                    warn!(database = %database_name, error = %err, "listing collections failed");
                    return DatabaseSchema {
                        database_name,
                        collections: Vec::new(),
                    };
                }
            },
        };

        let collections = if self.concurrent && names.len() > 1 {
            self.infer_concurrently(&store, names).await
        } else {
            let mut out = Vec::with_capacity(names.len());
            for name in &names {
                out.push(self.infer(store.as_ref(), name).await);
            }
            out
        };

        DatabaseSchema {
            database_name,
            collections,
        }
    }

    async fn infer_concurrently(
        &self,
        store: &Arc<dyn DocumentStore>,
        names: Vec<String>,
    ) -> Vec<CollectionSchema> {
        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let engine = self.clone();
                let store = Arc::clone(store);
                let name = name.clone();
                tokio::spawn(async move { engine.infer(store.as_ref(), &name).await })
            })
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for (name, handle) in names.into_iter().zip(handles) {
            match handle.await {
                Ok(schema) => out.push(schema),
                Err(err) => {
                    warn!(collection = %name, error = %err, "schema sampling task failed");
                    out.push(CollectionSchema::empty(name));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use nlq_core::{Document, FindRequest, TypeLabel};
    use serde_json::{json, Value as JsonValue};

    use super::*;
    use crate::storage::MemoryStore;
    use crate::traits::FindPage;

    fn seeded() -> Arc<dyn DocumentStore> {
        Arc::new(
            MemoryStore::from_json(
                "app",
                json!({
                    "users": [
                        {"_id": 1, "fullName": "Ada", "age": 36, "interests": ["math"]},
                        {"_id": 2, "fullName": "Alan", "age": "41"},
                    ],
                    "orders": [{"_id": 7, "total": 9.5, "shipping": {"city": "Paris"}}],
                    "empty": [],
                }),
            )
            .unwrap(),
        )
    }

    /// Store whose calls never finish, or fail, depending on the mode.
    struct BrokenStore {
        hang: bool,
    }

    #[async_trait]
    impl DocumentStore for BrokenStore {
        fn database_name(&self) -> &str {
            "broken"
        }

        async fn list_collections(&self) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("listing refused")
        }

        async fn sample(&self, _collection: &str, _max_count: usize) -> anyhow::Result<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn count(&self, _collection: &str, _filter: &Map<String, JsonValue>) -> anyhow::Result<u64> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            anyhow::bail!("connection reset")
        }

        async fn find(&self, _request: &FindRequest) -> anyhow::Result<FindPage> {
            Ok(FindPage::default())
        }
    }

    #[tokio::test]
    async fn infers_fields_and_counts() {
        let engine = SchemaInferenceEngine::default();
        let store = seeded();
        let users = engine.infer(store.as_ref(), "users").await;
        assert_eq!(users.sample_size, DEFAULT_SAMPLE_SIZE);
        assert_eq!(users.documents_sampled, 2);
        assert_eq!(users.fields["fullName"], TypeLabel::String);
        assert_eq!(users.fields["age"], TypeLabel::Mixed);
        assert!(!users.fields.contains_key("_id"));
    }

    #[tokio::test]
    async fn empty_collection_reports_zero() {
        let engine = SchemaInferenceEngine::default();
        let report = engine.infer(seeded().as_ref(), "empty").await;
        assert_eq!(report, CollectionSchema::empty("empty"));
    }

    #[tokio::test]
    async fn store_failure_yields_empty_table() {
        let engine = SchemaInferenceEngine::default();
        let report = engine.infer(&BrokenStore { hang: false }, "users").await;
        assert!(report.fields.is_empty());
        assert_eq!(report.documents_sampled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let engine = SchemaInferenceEngine::new(10, Duration::from_millis(50));
        let report = engine.infer(&BrokenStore { hang: true }, "users").await;
        assert_eq!(report, CollectionSchema::empty("users"));
    }

    #[tokio::test]
    async fn database_report_keeps_listing_order() {
        for concurrent in [true, false] {
            let engine = SchemaInferenceEngine::default().with_concurrency(concurrent);
            let report = engine.infer_database(seeded(), None).await;
            let names: Vec<_> = report.collections.iter().map(|c| c.collection_name.as_str()).collect();
            assert_eq!(names, vec!["users", "orders", "empty"]);
            assert_eq!(report.collections[1].fields["shipping.city"], TypeLabel::String);

            let schema = report.to_schema();
            assert_eq!(schema.len(), 3);
        }
    }

    #[tokio::test]
    async fn collection_filter_limits_report() {
        let report = SchemaInferenceEngine::default()
            .infer_database(seeded(), Some("orders"))
            .await;
        assert_eq!(report.database_name, "app");
        assert_eq!(report.collections.len(), 1);
        assert_eq!(report.collections[0].collection_name, "orders");
    }

    #[tokio::test]
    async fn listing_failure_yields_empty_report() {
        let report = SchemaInferenceEngine::default()
            .infer_database(Arc::new(BrokenStore { hang: false }), None)
            .await;
        assert_eq!(report.database_name, "broken");
        assert!(report.collections.is_empty());
    }
}
