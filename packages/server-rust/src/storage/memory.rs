//! In-memory [`DocumentStore`] seeded from JSON.

use std::cmp::Ordering;

use async_trait::async_trait;
use indexmap::IndexMap;
use nlq_core::types::document_from_json;
use nlq_core::{Document, FindRequest};
use parking_lot::RwLock;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::StoreError;
use crate::storage::filter::{lookup, sort_order, FilterExpr};
use crate::storage::projection::Projection;
use crate::traits::{DocumentStore, FindPage};

/// Document store holding every collection in memory.
///
/// Collections keep insertion order, and so do the documents inside them.
pub struct MemoryStore {
    database: String,
    collections: RwLock<IndexMap<String, Vec<Document>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collections: RwLock::new(IndexMap::new()),
        }
    }

    /// Builds a store from `{"collection": [doc, ...], ...}`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRequest`] if the seed is not an object of
    /// arrays of documents.
    pub fn from_json(database: impl Into<String>, seed: JsonValue) -> Result<Self, StoreError> {
        let JsonValue::Object(collections) = seed else {
            return Err(StoreError::InvalidRequest(
                "seed must map collection names to arrays of documents".to_string(),
            ));
        };
        let store = Self::new(database);
        for (name, docs) in collections {
            let JsonValue::Array(items) = docs else {
                return Err(StoreError::InvalidRequest(format!(
                    "seed for collection {name} must be an array"
                )));
            };
            let documents = items
                .into_iter()
                .map(|item| {
                    document_from_json(item).ok_or_else(|| {
                        StoreError::InvalidRequest(format!("seed for collection {name} contains a non-document"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            store.insert_many(name, documents);
        }
        Ok(store)
    }

    /// Appends documents, creating the collection if needed.
    pub fn insert_many(&self, collection: impl Into<String>, documents: impl IntoIterator<Item = Document>) {
        self.collections
            .write()
            .entry(collection.into())
            .or_default()
            .extend(documents);
    }
}

fn compare_by_keys(a: &Document, b: &Document, keys: &[IndexMap<String, i32>]) -> Ordering {
    keys.iter()
        .flat_map(IndexMap::iter)
        .map(|(field, direction)| {
            let order = sort_order(lookup(a, field).first().copied(), lookup(b, field).first().copied());
            if *direction < 0 {
                order.reverse()
            } else {
                order
            }
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn list_collections(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.collections.read().keys().cloned().collect())
    }

    async fn sample(&self, collection: &str, max_count: usize) -> anyhow::Result<Vec<Document>> {
        let collections = self.collections.read();
        let docs = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(docs.iter().take(max_count).cloned().collect())
    }

    async fn count(&self, collection: &str, filter: &Map<String, JsonValue>) -> anyhow::Result<u64> {
        let expr = FilterExpr::parse(filter)?;
        let collections = self.collections.read();
        let docs = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(docs.iter().filter(|d| expr.matches(d)).count() as u64)
    }

    async fn find(&self, request: &FindRequest) -> anyhow::Result<FindPage> {
        request.validate().map_err(StoreError::InvalidRequest)?;
        if request.db_name != self.database {
            return Err(StoreError::UnknownDatabase(request.db_name.clone()).into());
        }
        let expr = FilterExpr::parse(&request.filter)?;
        let projection = request.projection.as_ref().map(Projection::parse).transpose()?;

        let collections = self.collections.read();
        let docs = collections
            .get(&request.collection_name)
            .ok_or_else(|| StoreError::UnknownCollection(request.collection_name.clone()))?;

        let mut matched: Vec<&Document> = docs.iter().filter(|d| expr.matches(d)).collect();
        let total_count = matched.len() as u64;
        if let Some(keys) = request.sort.as_deref() {
            matched.sort_by(|a, b| compare_by_keys(a, b, keys));
        }

        let skip = usize::try_from(request.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(request.limit).unwrap_or(usize::MAX);
        let documents: Vec<Document> = matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| projection.as_ref().map_or_else(|| d.clone(), |p| p.apply(d)))
            .collect();

        debug!(
            collection = %request.collection_name,
            total_count,
            returned = documents.len(),
            "memory store find"
        );
        Ok(FindPage { documents, total_count })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::from_json(
            "app",
            json!({
                "users": [
                    {"_id": 1, "fullName": "Ada", "age": 36, "interests": ["math"]},
                    {"_id": 2, "fullName": "Alan", "age": 41, "interests": ["running", "math"]},
                    {"_id": 3, "fullName": "Grace", "age": 85},
                ],
                "orders": [],
            }),
        )
        .unwrap()
    }

    fn request(extra: JsonValue) -> FindRequest {
        let mut base = json!({"db_name": "app", "collection_name": "users"});
        if let (Some(target), JsonValue::Object(fields)) = (base.as_object_mut(), extra) {
            target.extend(fields);
        }
        serde_json::from_value(base).unwrap()
    }

    fn ids(page: &FindPage) -> Vec<JsonValue> {
        page.documents.iter().map(|d| d["_id"].to_json()).collect()
    }

    #[tokio::test]
    async fn lists_collections_in_seed_order() {
        assert_eq!(store().list_collections().await.unwrap(), vec!["users", "orders"]);
    }

    #[tokio::test]
    async fn sample_respects_max_count() {
        let store = store();
        assert_eq!(store.sample("users", 2).await.unwrap().len(), 2);
        assert!(store.sample("orders", 100).await.unwrap().is_empty());
        let err = store.sample("widgets", 1).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::UnknownCollection(_))));
    }

    #[tokio::test]
    async fn count_applies_filter() {
        let store = store();
        let filter = json!({"interests": {"$in": ["math"]}});
        assert_eq!(store.count("users", filter.as_object().unwrap()).await.unwrap(), 2);
        assert_eq!(store.count("users", &Map::new()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn find_sorts_pages_and_reports_total() {
        let page = store()
            .find(&request(json!({"sort": [{"age": -1}], "skip": 1, "limit": 1})))
            .await
            .unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(ids(&page), vec![json!(2)]);
    }

    #[tokio::test]
    async fn find_projects_documents() {
        let page = store()
            .find(&request(json!({"filter": {"age": {"$lt": 40}}, "projection": {"fullName": 1, "_id": 0}})))
            .await
            .unwrap();
        assert_eq!(page.documents.len(), 1);
        assert_eq!(nlq_core::types::document_to_json(&page.documents[0]), json!({"fullName": "Ada"}));
    }

    #[tokio::test]
    async fn find_rejects_bad_requests() {
        let store = store();
        let err = store.find(&request(json!({"limit": 0}))).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::InvalidRequest(_))));

        let err = store.find(&request(json!({"filter": {"age": {"$near": 1}}}))).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::InvalidFilter(_))));

        let err = store.find(&request(json!({"db_name": "other"}))).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::UnknownDatabase(_))));
    }

    #[test]
    fn seed_must_be_collections_of_documents() {
        assert!(MemoryStore::from_json("app", json!([1, 2])).is_err());
        assert!(MemoryStore::from_json("app", json!({"users": {"a": 1}})).is_err());
        assert!(MemoryStore::from_json("app", json!({"users": [1]})).is_err());
    }
}
