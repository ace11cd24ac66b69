use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

pub async fn watcher_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.watcher.status();
    Json(json!({
        "watching": status.watching,
        "counters": {
            "changed": status.changed,
            "created": status.created,
            "deleted": status.deleted,
            "errors": status.errors,
        },
    }))
}

pub async fn watcher_enable(State(state): State<AppState>) -> impl IntoResponse {
    state.watcher.enable();
    Json(json!({ "watching": true }))
}

pub async fn watcher_disable(State(state): State<AppState>) -> impl IntoResponse {
    state.watcher.disable();
    Json(json!({ "watching": false }))
}
