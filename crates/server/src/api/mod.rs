//! # API
//!
//! REST handlers and the conversation WebSocket, nested under `/api/v1`.

pub mod conversations;
pub mod ws;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Error returned by REST handlers, rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "Request failed");
        ApiError::Internal(err.to_string())
    }
}
