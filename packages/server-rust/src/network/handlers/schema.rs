//! Schema inference endpoints.

use axum::extract::State;
use axum::Json;
use nlq_core::DatabaseSchema;
use serde::Deserialize;

use super::{ApiError, AppState};

/// Body of `POST /schema`. Both fields are optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SchemaRequest {
    /// Database to sample; the configured one when absent.
    pub db_name: Option<String>,
    /// Restrict the report to one collection.
    pub collection_name: Option<String>,
}

/// `POST /schema`: samples and classifies without touching the cache.
pub async fn schema_handler(
    State(state): State<AppState>,
    Json(request): Json<SchemaRequest>,
) -> Result<Json<DatabaseSchema>, ApiError> {
    let _guard = state.admit()?;
    let report = state
        .service
        .infer_schema(request.db_name.as_deref(), request.collection_name.as_deref())
        .await?;
    Ok(Json(report))
}

/// `POST /schema/refresh`: re-samples the configured database into the cache.
pub async fn refresh_schema_handler(State(state): State<AppState>) -> Result<Json<DatabaseSchema>, ApiError> {
    let _guard = state.admit()?;
    Ok(Json(state.service.refresh_schema().await?))
}
