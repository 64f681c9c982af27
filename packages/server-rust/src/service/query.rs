//! Query pipeline: cached schema, translate, enhance, execute, narrate.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use nlq_core::translator::UNRESOLVED_COLLECTION;
use nlq_core::types::document_to_json;
use nlq_core::{
    DatabaseSchema, DirectOutcome, DirectPatternFallback, FindRequest, FindResponse, Intent,
    LexicalMatcher, QueryDescriptor, QueryEnhancer, QueryTranslator, Schema,
};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::error::QueryError;
use crate::schema::SchemaInferenceEngine;
use crate::service::config::ServerConfig;
use crate::service::narrate::narrate;
use crate::storage::StorePool;
use crate::traits::DocumentStore;

/// Translator built over the last inferred schema, plus the collection list
/// the direct-pattern fallback validates against.
struct SchemaCache {
    translator: QueryTranslator,
    collections: Vec<String>,
}

/// Executed query with its explanation.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub descriptor: QueryDescriptor,
    pub response: FindResponse,
    pub explanation: String,
}

/// Shared query pipeline behind the HTTP handlers and the CLI.
///
/// Holds the schema cache for the configured database. The cache starts
/// empty; until [`refresh_schema`](Self::refresh_schema) runs, translation
/// goes through the direct-pattern fallback.
pub struct QueryService {
    config: ServerConfig,
    pool: Arc<StorePool>,
    inference: SchemaInferenceEngine,
    cache: ArcSwap<SchemaCache>,
    enhancers: Vec<Arc<dyn QueryEnhancer>>,
}

impl QueryService {
    #[must_use]
    pub fn new(config: ServerConfig, pool: Arc<StorePool>) -> Self {
        let inference = SchemaInferenceEngine::new(config.sample_size, config.schema_timeout)
            .with_concurrency(config.concurrent_sampling);
        let cache = ArcSwap::from_pointee(build_cache(&config, Schema::new(), Vec::new()));
        Self {
            config,
            pool,
            inference,
            cache,
            enhancers: Vec::new(),
        }
    }

    /// Appends an enhancer. Enhancers run in registration order.
    #[must_use]
    pub fn with_enhancer(mut self, enhancer: Arc<dyn QueryEnhancer>) -> Self {
        self.enhancers.push(enhancer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Snapshot of the cached schema.
    #[must_use]
    pub fn schema(&self) -> Schema {
        self.cache.load().translator.schema().clone()
    }

    fn store(&self, database: Option<&str>) -> Result<Arc<dyn DocumentStore>, QueryError> {
        Ok(self.pool.get(database.unwrap_or(&self.config.database))?)
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// Infers a schema report without touching the cache.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownDatabase`] if the pool has no store for
    /// `database`. Sampling failures degrade to empty tables instead.
    pub async fn infer_schema(
        &self,
        database: Option<&str>,
        collection: Option<&str>,
    ) -> Result<DatabaseSchema, QueryError> {
        let store = self.store(database)?;
        Ok(self.inference.infer_database(store, collection).await)
    }

    /// Re-samples the configured database and swaps in a new translator.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownDatabase`] if the configured database has
    /// no store.
    pub async fn refresh_schema(&self) -> Result<DatabaseSchema, QueryError> {
        let report = match self.infer_schema(None, None).await {
            Ok(report) => report,
            Err(err) => {
                metrics::counter!("nlq_schema_refresh_total", "outcome" => "error").increment(1);
                return Err(err);
            }
        };
        let collections: Vec<String> = report
            .collections
            .iter()
            .map(|c| c.collection_name.clone())
            .collect();
        info!(
            database = %report.database_name,
            collections = collections.len(),
            "schema cache refreshed"
        );
        self.cache
            .store(Arc::new(build_cache(&self.config, report.to_schema(), collections)));
        metrics::counter!("nlq_schema_refresh_total", "outcome" => "ok").increment(1);
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Translate
    // -----------------------------------------------------------------------

    /// Translates `text` and runs the enhancers. Never fails: problems are
    /// reported in the descriptor's metadata.
    pub async fn translate(&self, text: &str) -> QueryDescriptor {
        let cache = self.cache.load_full();
        let descriptor = if cache.translator.schema().is_empty() {
            let known = if cache.collections.is_empty() {
                self.list_collections().await
            } else {
                cache.collections.clone()
            };
            translate_without_schema(&self.config.database, &cache.translator, known, text)
        } else {
            cache.translator.translate(text)
        };
        self.enhance(descriptor, text).await
    }

    /// Translates `text` against a caller-supplied schema, bypassing the cache.
    pub async fn translate_with_schema(&self, text: &str, schema: Schema) -> QueryDescriptor {
        let cache = build_cache(&self.config, schema, Vec::new());
        let descriptor = cache.translator.translate(text);
        self.enhance(descriptor, text).await
    }

    /// Collection names of the configured database, or none if the store
    /// cannot list them.
    async fn list_collections(&self) -> Vec<String> {
        let listed = match self.store(None) {
            Ok(store) => store.list_collections().await.map_err(QueryError::from),
            Err(err) => Err(err),
        };
        listed.unwrap_or_else(|err| {
            warn!(database = %self.config.database, error = %err, "listing collections failed");
            Vec::new()
        })
    }

    async fn enhance(&self, mut descriptor: QueryDescriptor, text: &str) -> QueryDescriptor {
        for enhancer in &self.enhancers {
            let previous = descriptor.clone();
            descriptor = match enhancer.enhance(descriptor, text).await {
                Ok(enhanced) => enhanced,
                Err(err) => {
                    warn!(enhancer = enhancer.name(), error = %err, "enhancer failed, keeping previous descriptor");
                    previous
                }
            };
        }
        descriptor
    }

    // -----------------------------------------------------------------------
    // Execute
    // -----------------------------------------------------------------------

    /// Runs a find request against the store for its database.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRequest`] for out-of-range parameters or a
    /// malformed filter, not-found errors for unknown databases and
    /// collections, and [`QueryError::Store`] for anything else.
    pub async fn find(&self, request: &FindRequest) -> Result<FindResponse, QueryError> {
        request.validate().map_err(QueryError::InvalidRequest)?;
        let store = self.store(Some(&request.db_name))?;
        let page = store.find(request).await?;
        Ok(FindResponse {
            count: page.documents.len(),
            results: page.documents.iter().map(document_to_json).collect(),
            total_count: page.total_count,
            database_name: request.db_name.clone(),
            collection_name: request.collection_name.clone(),
        })
    }

    /// Executes a translated descriptor and explains the result.
    ///
    /// Count queries run with the translator's count ceiling as their limit
    /// unless the text stated one.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Unresolved`] when the descriptor carries no
    /// executable query, otherwise whatever [`find`](Self::find) returns.
    pub async fn execute(&self, descriptor: QueryDescriptor) -> Result<QueryOutcome, QueryError> {
        let Some(query) = descriptor.query.as_ref() else {
            let message = descriptor.error().unwrap_or(UNRESOLVED_COLLECTION);
            return Err(QueryError::Unresolved(message.to_string()));
        };
        let mut request = query.to_find_request();
        if descriptor.meta.intent == Intent::Count && !descriptor.meta.explicit_limit {
            request.limit = self.config.translator.default_count_limit;
        }

        let response = self.find(&request).await?;
        let explanation = narrate(
            descriptor.meta.intent,
            &query.collection,
            &query.filter,
            response.total_count,
            response.count,
            request.limit,
        );
        Ok(QueryOutcome {
            descriptor,
            response,
            explanation,
        })
    }

    /// Translates, enhances, and executes `text`.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn query(&self, text: &str) -> Result<QueryOutcome, QueryError> {
        let started = Instant::now();
        let span = info_span!("nl_query", query = %text);
        let result = async {
            let descriptor = self.translate(text).await;
            self.execute(descriptor).await
        }
        .instrument(span)
        .await;

        let (intent, outcome) = match &result {
            Ok(o) => (o.descriptor.meta.intent.to_string(), "ok"),
            Err(err) => ("unknown".to_string(), err.kind()),
        };
        metrics::counter!("nlq_queries_total", "intent" => intent, "outcome" => outcome).increment(1);
        metrics::histogram!("nlq_query_duration_seconds").record(started.elapsed().as_secs_f64());
        result
    }
}

/// Direct-pattern translation used while no schema is cached. Text the
/// fallback cannot handle goes to the translator, which reports the missing
/// collection.
fn translate_without_schema(
    database: &str,
    translator: &QueryTranslator,
    known: Vec<String>,
    text: &str,
) -> QueryDescriptor {
    match DirectPatternFallback::new(database, known).parse(text) {
        Some(DirectOutcome::Query(descriptor)) => descriptor,
        Some(DirectOutcome::UnknownCollection { name, available }) => {
            let mut descriptor = translator.translate(text);
            descriptor.meta.error = Some(format!(
                "Collection '{name}' not found. Available collections: {}",
                available.join(", ")
            ));
            descriptor
        }
        None => translator.translate(text),
    }
}

fn build_cache(config: &ServerConfig, schema: Schema, collections: Vec<String>) -> SchemaCache {
    let translator = QueryTranslator::new(config.database.clone(), Arc::new(schema))
        .with_config(config.translator.clone())
        .with_matcher(LexicalMatcher::new(config.matcher.clone()));
    SchemaCache {
        translator,
        collections,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::storage::MemoryStore;

    fn service() -> QueryService {
        let store = MemoryStore::from_json(
            "app",
            json!({
                "users": [
                    {"_id": 1, "fullName": "Ada Lovelace", "age": 36, "interests": ["math", "hiking"]},
                    {"_id": 2, "fullName": "Alan Turing", "age": 41, "interests": ["running"]},
                    {"_id": 3, "fullName": "Grace Hopper", "age": 85, "interests": ["hiking"]},
                ],
                "orders": [{"_id": 10, "total": 12.5, "status": "shipped"}],
            }),
        )
        .unwrap();
        let pool = StorePool::new();
        pool.register(Arc::new(store));
        let config = ServerConfig {
            database: "app".to_string(),
            ..ServerConfig::default()
        };
        QueryService::new(config, Arc::new(pool))
    }

    struct Failing;

    #[async_trait]
    impl QueryEnhancer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn enhance(&self, _descriptor: QueryDescriptor, _text: &str) -> anyhow::Result<QueryDescriptor> {
            anyhow::bail!("model unavailable")
        }
    }

    struct Paginate;

    #[async_trait]
    impl QueryEnhancer for Paginate {
        fn name(&self) -> &str {
            "paginate"
        }

        async fn enhance(&self, mut descriptor: QueryDescriptor, _text: &str) -> anyhow::Result<QueryDescriptor> {
            if let Some(query) = descriptor.query.as_mut() {
                query.limit = 1;
            }
            Ok(descriptor)
        }
    }

    #[tokio::test]
    async fn refresh_populates_schema() {
        let service = service();
        assert!(service.schema().is_empty());
        let report = service.refresh_schema().await.unwrap();
        assert_eq!(report.collections.len(), 2);
        assert_eq!(
            service.schema().collection_names().collect::<Vec<_>>(),
            vec!["users", "orders"]
        );
    }

    #[tokio::test]
    async fn query_runs_full_pipeline() {
        let service = service();
        service.refresh_schema().await.unwrap();
        let outcome = service.query("find users with interests in hiking").await.unwrap();
        assert_eq!(outcome.response.total_count, 2);
        assert_eq!(outcome.response.collection_name, "users");
        assert!(outcome.explanation.starts_with("Found 2 document(s) in the users collection"));
    }

    #[tokio::test]
    async fn count_uses_total() {
        let service = service();
        service.refresh_schema().await.unwrap();
        let outcome = service.query("how many users are there").await.unwrap();
        assert_eq!(outcome.descriptor.meta.intent, Intent::Count);
        assert_eq!(outcome.explanation, "There are 3 document(s) in the users collection.");
    }

    #[tokio::test]
    async fn count_keeps_stated_limit() {
        let service = service();
        service.refresh_schema().await.unwrap();
        let outcome = service.query("how many users top 2").await.unwrap();
        assert_eq!(outcome.descriptor.meta.intent, Intent::Count);
        assert_eq!(outcome.response.count, 2);
        assert_eq!(outcome.response.total_count, 3);

        let outcome = service.query("how many users are there").await.unwrap();
        assert_eq!(outcome.response.count, 3);
    }

    #[tokio::test]
    async fn empty_cache_uses_direct_patterns() {
        let service = service();
        let descriptor = service.translate("show records from the orders collection with status shipped").await;
        let query = descriptor.query.as_ref().unwrap();
        assert_eq!(query.collection, "orders");
        assert_eq!(descriptor.meta.extractors, vec!["direct"]);

        let outcome = service.execute(descriptor).await.unwrap();
        assert_eq!(outcome.response.total_count, 1);
    }

    #[tokio::test]
    async fn empty_cache_reports_unknown_collection() {
        let service = service();
        let descriptor = service.translate("show everything from the widgets collection").await;
        assert!(descriptor.query.is_none());
        assert_eq!(
            descriptor.error(),
            Some("Collection 'widgets' not found. Available collections: users, orders")
        );
    }

    #[tokio::test]
    async fn empty_cache_without_pattern_is_unresolved() {
        let service = service();
        let descriptor = service.translate("how many users are there").await;
        assert!(descriptor.query.is_none());
        let err = service.execute(descriptor).await.unwrap_err();
        assert!(matches!(err, QueryError::Unresolved(ref m) if m == UNRESOLVED_COLLECTION));
    }

    #[tokio::test]
    async fn failing_enhancer_is_skipped() {
        let service = service()
            .with_enhancer(Arc::new(Failing))
            .with_enhancer(Arc::new(Paginate));
        service.refresh_schema().await.unwrap();
        let outcome = service.query("find users").await.unwrap();
        assert_eq!(outcome.response.count, 1);
        assert_eq!(outcome.response.total_count, 3);
    }

    #[tokio::test]
    async fn supplied_schema_bypasses_cache() {
        let service = service();
        let schema: Schema = serde_json::from_value(json!({
            "customers": {"fullName": "string", "age": "integer"}
        }))
        .unwrap();
        let descriptor = service.translate_with_schema("list customers", schema).await;
        assert_eq!(descriptor.query.unwrap().collection, "customers");
        assert!(service.schema().is_empty());
    }

    #[tokio::test]
    async fn find_rejects_unknown_targets() {
        let service = service();
        let request: FindRequest =
            serde_json::from_value(json!({"db_name": "app", "collection_name": "widgets"})).unwrap();
        assert!(matches!(
            service.find(&request).await,
            Err(QueryError::UnknownCollection(_))
        ));

        let request: FindRequest =
            serde_json::from_value(json!({"db_name": "nope", "collection_name": "users"})).unwrap();
        assert!(matches!(service.find(&request).await, Err(QueryError::UnknownDatabase(_))));

        let request: FindRequest =
            serde_json::from_value(json!({"db_name": "app", "collection_name": "users", "limit": 5000})).unwrap();
        assert!(matches!(service.find(&request).await, Err(QueryError::InvalidRequest(_))));
    }
}
