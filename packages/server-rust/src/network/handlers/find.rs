use axum::extract::State;
use axum::Json;
use nlq_core::{FindRequest, FindResponse};

use super::{ApiError, AppState};

/// `POST /find`: executes a store request as given.
pub async fn find_handler(
    State(state): State<AppState>,
    Json(request): Json<FindRequest>,
) -> Result<Json<FindResponse>, ApiError> {
    let _guard = state.admit()?;
    Ok(Json(state.service.find(&request).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::network::handlers::test_support::ready_state;

    fn request(body: serde_json::Value) -> Json<FindRequest> {
        Json(serde_json::from_value(body).unwrap())
    }

    #[tokio::test]
    async fn find_returns_page() {
        let response = find_handler(
            State(ready_state()),
            request(json!({
                "db_name": "app",
                "collection_name": "users",
                "filter": {"fullName": {"$regex": "^ada", "$options": "i"}},
                "projection": {"fullName": 1},
            })),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(response.count, 1);
        assert_eq!(response.total_count, 1);
        assert_eq!(response.results[0], json!({"_id": 1, "fullName": "Ada Lovelace"}));
    }

    #[tokio::test]
    async fn bad_filter_is_bad_request() {
        let err = find_handler(
            State(ready_state()),
            request(json!({"db_name": "app", "collection_name": "users", "filter": {"$where": "1"}})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let err = find_handler(
            State(ready_state()),
            request(json!({"db_name": "app", "collection_name": "widgets"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
