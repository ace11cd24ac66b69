use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.metrics.uptime_seconds(),
    }))
}

pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let index_loaded = state.indexer.is_loaded();
    let watcher_status = state.watcher.status();
    let ready = index_loaded && (!state.config.enable_watcher || watcher_status.watching);

    let body = json!({
        "status": if ready { "ready" } else { "not_ready" },
        "index_loaded": index_loaded,
        "project": state.config.project_root.file_name().map(|n| n.to_string_lossy().to_string()),
        "watcher_status": if watcher_status.watching { "watching" } else { "stopped" },
        "file_count": state.indexer.file_count(),
        "timestamp": Utc::now().to_rfc3339(),
    });

    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(body))
}
