use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::metrics::memory_usage_mb;
use crate::state::AppState;

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let counts = state.metrics.counts();
    let watcher = state.watcher.status();
    let (rss_mb, heap_used_mb, heap_total_mb) = memory_usage_mb();

    Json(json!({
        "uptime_seconds": state.metrics.uptime_seconds(),
        "requests": {
            "total": counts.total,
            "search": counts.search,
            "index": counts.index,
            "tools": counts.tools,
            "requests_per_second": counts.requests_per_second,
        },
        "errors": state.metrics.error_count(),
        "index": {
            "file_count": state.indexer.file_count(),
            "loaded": state.indexer.is_loaded(),
            "last_index_time": state.metrics.last_index_time(),
        },
        "watcher": {
            "isWatching": watcher.watching,
            "filesChanged": watcher.changed,
            "filesCreated": watcher.created,
            "filesDeleted": watcher.deleted,
            "errors": watcher.errors,
        },
        "memory": {
            "rss_mb": rss_mb,
            "heap_used_mb": heap_used_mb,
            "heap_total_mb": heap_total_mb,
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
