use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;

/// Converts AppError into a JSON `{"message": ...}` response.
///
/// Server-side failures are logged in full and rendered with a generic
/// message so storage details never reach the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Ai(msg) => {
                tracing::error!("AI request failed: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "AI service is unavailable".to_string(),
                )
            }
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => {
                tracing::error!("Request failed: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "message": message
        });

        (status, axum::Json(body)).into_response()
    }
}
