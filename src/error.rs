use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("path escapes project root: {0}")]
    PathUnsafe(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to parse: {0}")]
    ParseInvalid(String),

    #[error("request too large: {0}")]
    TooLarge(String),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("watcher failure: {0}")]
    WatcherFailure(String),

    #[error("already running")]
    AlreadyRunning,

    #[error("request timed out")]
    Timeout,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("serialization failure: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::ConfigInvalid(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::PathUnsafe(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::ParseInvalid(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::TooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::WatcherFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::AlreadyRunning => (StatusCode::OK, self.to_string()),
            AppError::Timeout => (StatusCode::REQUEST_TIMEOUT, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Serde(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        let body = json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
