use axum::{extract::State, response::IntoResponse, Json};

use crate::probe;
use crate::state::AppState;

pub async fn project_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(probe::probe(&state.config.project_root))
}
