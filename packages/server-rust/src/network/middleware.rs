//! Tower middleware applied to every HTTP request.
//!
//! Layers are listed outermost first: the first layer sees the request
//! first and the response last.

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::{RequestBodyLimitLayer, ResponseBody};
use tower_http::map_response_body::MapResponseBodyLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

const REQUEST_ID_HEADER: &str = "x-request-id";

type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        TimeoutLayer,
        Stack<
            RequestBodyLimitLayer,
            Stack<
                MapResponseBodyLayer<fn(ResponseBody<Body>) -> Body>,
                Stack<
                    CorsLayer,
                    Stack<
                        CompressionLayer,
                        Stack<
                            TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
                            Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
                        >,
                    >,
                >,
            >,
        >,
    >,
>;

/// Builds the HTTP middleware stack.
///
/// Outermost to innermost:
/// 1. `SetRequestId`: UUID v4 `x-request-id` on every request
/// 2. `Trace`: request/response spans
/// 3. `Compression`: gzip responses
/// 4. `Cors`: configured origins, `GET` and `POST` only
/// 5. `RequestBodyLimit`: rejects oversized bodies with 413
/// 6. `Timeout`: 408 once `request_timeout` elapses
/// 7. `PropagateRequestId`: copies `x-request-id` onto the response
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        // Type adapter only: `Cors` needs a `Default` response body.
        .layer(MapResponseBodyLayer::new(
            Body::new as fn(ResponseBody<Body>) -> Body,
        ))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(request_id))
        .into_inner()
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
