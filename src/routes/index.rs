use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn reindex_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.record_index();

    if !state.indexer.try_begin_rebuild() {
        return (StatusCode::OK, Json(json!({ "status": "already_running" })));
    }

    let indexer = state.indexer.clone();
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        match indexer.rebuild_and_save().await {
            Ok(count) => {
                metrics.record_index_completed(indexer.indexed_at().to_rfc3339());
                info!(file_count = count, "reindex complete");
            }
            Err(e) => {
                metrics.record_error();
                warn!(error = %e, "reindex failed");
            }
        }
    });

    (StatusCode::ACCEPTED, Json(json!({ "status": "indexing" })))
}
