//! HTTP handlers and the state they share.
//!
//! [`AppState`] travels through axum's `State` extractor. [`ApiError`] maps
//! service failures to status codes with a `{"error": "..."}` body.

pub mod find;
pub mod health;
pub mod query;
pub mod schema;

pub use find::find_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use query::{query_handler, translate_handler};
pub use schema::{refresh_schema_handler, schema_handler};

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use super::{NetworkConfig, RequestGuard, ShutdownController};
use crate::error::QueryError;
use crate::service::QueryService;

/// Shared state for all handlers. Cloning copies `Arc`s only.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QueryService>,
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Used for uptime.
    pub start_time: Instant,
}

impl AppState {
    /// Admits one API request, or refuses while not ready.
    fn admit(&self) -> Result<RequestGuard, ApiError> {
        self.shutdown.admit().ok_or(ApiError::Unavailable)
    }
}

/// Failure returned by an API handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("server is not accepting requests")]
    Unavailable,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Query(QueryError::Unresolved(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Query(QueryError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Self::Query(QueryError::UnknownCollection(_) | QueryError::UnknownDatabase(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Query(QueryError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
