use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;

use crate::config::MAX_SEARCH_QUERY_LENGTH;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
}

pub async fn search_handler(
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.metrics.record_search();

    if body.query.len() > MAX_SEARCH_QUERY_LENGTH {
        return Err(AppError::BadRequest(format!(
            "query exceeds {} characters",
            MAX_SEARCH_QUERY_LENGTH
        )));
    }

    let limit = body.limit.unwrap_or(10).clamp(1, 100);
    let results = state.indexer.search(&body.query, limit);
    Ok(Json(json!({ "results": results })))
}
