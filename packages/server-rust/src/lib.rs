//! `nlq` Server: schema sampling, query execution and the HTTP API around
//! the `nlq-core` translator.

pub mod error;
pub mod network;
pub mod schema;
pub mod service;
pub mod storage;
pub mod traits;

pub use error::{QueryError, StoreError};
pub use traits::{DocumentStore, FindPage};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::service::{QueryService, ServerConfig};
    use crate::storage::{MemoryStore, StorePool};

    #[tokio::test]
    async fn translated_requests_run_unmodified_on_the_store() {
        let store = MemoryStore::from_json(
            "app",
            json!({
                "users": [
                    {"fullName": "Ada", "age": 36, "interests": ["hiking"], "username": "ada"},
                    {"fullName": "Alan", "age": 41, "interests": ["running"], "username": "alan"},
                ],
            }),
        )
        .unwrap();
        let pool = StorePool::new();
        pool.register(Arc::new(store));
        let service = QueryService::new(
            ServerConfig {
                database: "app".to_string(),
                ..ServerConfig::default()
            },
            Arc::new(pool),
        );
        service.refresh_schema().await.unwrap();

        for text in [
            "find users with interests in hiking",
            "how many users are there",
            "sort users by age desc",
            "show users named ada",
            "find users older than 40",
            "list the top 1 users",
        ] {
            let descriptor = service.translate(text).await;
            let request = descriptor.find_request().unwrap();
            assert!(service.find(&request).await.is_ok(), "{text}: {request:?}");
        }
    }
}
