//! Translation from `AppError` to HTTP responses. Every failure becomes
//! `{"message": "<reason>"}`; internal failures are logged and replaced
//! with a generic message so nothing leaks.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use domains::AppError;

#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string()),
            AppError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.0.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.0.to_string()),
            AppError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, self.0.to_string()),
            AppError::Internal(reason) => {
                tracing::error!(%reason, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

/// Shorthand for handler signatures.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
