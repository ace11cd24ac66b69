use axum::{
    error_handling::HandleErrorLayer,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Json, Router,
};
use serde_json::json;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{MAX_BODY_BYTES, MAX_CONCURRENT_CONNECTIONS, REQUEST_TIMEOUT_SECS};
use crate::routes;
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            is_localhost_origin(origin)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/ready", get(routes::health::ready_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        .route("/project", get(routes::project::project_handler))
        .route("/search", post(routes::search::search_handler))
        .route("/index", post(routes::index::reindex_handler))
        .route("/tools/list", get(routes::tools::tools_list))
        .route("/tools/call", post(routes::tools::tools_call))
        .route("/watcher/status", get(routes::watcher::watcher_status))
        .route("/watcher/enable", post(routes::watcher::watcher_enable))
        .route("/watcher/disable", post(routes::watcher::watcher_disable))
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            track_metrics,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .concurrency_limit(MAX_CONCURRENT_CONNECTIONS),
        )
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `Access-Control-Allow-Origin` echoes the request's `Origin` only for
/// `http://localhost:*` / `http://127.0.0.1:*`; every other origin gets no
/// CORS header at all.
fn is_localhost_origin(origin: &HeaderValue) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    s.strip_prefix("http://localhost:")
        .or_else(|| s.strip_prefix("http://127.0.0.1:"))
        .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

async fn track_metrics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    state.metrics.record_request();
    let response = next.run(req).await;
    if response.status().is_server_error() {
        state.metrics.record_error();
    }
    response
}

async fn handle_middleware_error(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "error": "request timed out" })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal error" })),
        )
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not_found" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_origins_match() {
        assert!(is_localhost_origin(&HeaderValue::from_static(
            "http://localhost:3000"
        )));
        assert!(is_localhost_origin(&HeaderValue::from_static(
            "http://127.0.0.1:5173"
        )));
        assert!(!is_localhost_origin(&HeaderValue::from_static(
            "http://evil.example.com"
        )));
    }
}
