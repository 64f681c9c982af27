//! Natural-language endpoints.

use axum::extract::State;
use axum::Json;
use nlq_core::{QueryDescriptor, Schema};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::service::QueryOutcome;

/// Body of `POST /translate`.
#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub query: String,
    /// Translate against this schema instead of the cached one.
    #[serde(default)]
    pub schema: Option<Schema>,
}

/// Body of `POST /query`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// `POST /translate`: returns the descriptor without executing it.
///
/// Translation problems are reported in `_meta.error` with status 200.
pub async fn translate_handler(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<QueryDescriptor>, ApiError> {
    let _guard = state.admit()?;
    let descriptor = match request.schema {
        Some(schema) => state.service.translate_with_schema(&request.query, schema).await,
        None => state.service.translate(&request.query).await,
    };
    Ok(Json(descriptor))
}

/// `POST /query`: translates, executes and explains.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryOutcome>, ApiError> {
    let _guard = state.admit()?;
    Ok(Json(state.service.query(&request.query).await?))
}
