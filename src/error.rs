use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

pub const MSG_FORBIDDEN: &str = "Insufficient permissions";
pub const MSG_NOT_RUNNING: &str = "Activity not started or already ended";
pub const MSG_NOT_ENROLLED: &str = "You are not enrolled in this course";
pub const MSG_EMPTY_ANSWER: &str = "Answer cannot be empty";

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// No valid credentials were presented.
    #[error("authentication required")]
    Unauthenticated,
    /// The caller lacks the role or ownership required.
    #[error("insufficient permissions")]
    Forbidden,
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Submission attempted while the activity is not running.
    #[error("activity not started or already ended")]
    NotRunning,
    /// Student is not enrolled in the activity's course.
    #[error("student not enrolled in course")]
    NotEnrolled,
    /// Whitespace-only answer.
    #[error("empty answer")]
    EmptyAnswer,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or unknown credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// User-facing message, without the variant prefix used in logs.
    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest(message)
            | AppError::Unauthorized(message)
            | AppError::Forbidden(message)
            | AppError::NotFound(message)
            | AppError::Conflict(message)
            | AppError::ServiceUnavailable(message)
            | AppError::Internal(message) => message,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => {
                tracing::warn!(error = %source, "storage failure surfaced to client");
                AppError::ServiceUnavailable("Storage unavailable".into())
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("Storage unavailable".into()),
            ServiceError::Unauthenticated => AppError::Unauthorized("Authentication required".into()),
            ServiceError::Forbidden => AppError::Forbidden(MSG_FORBIDDEN.into()),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::NotRunning => AppError::BadRequest(MSG_NOT_RUNNING.into()),
            ServiceError::NotEnrolled => AppError::Forbidden(MSG_NOT_ENROLLED.into()),
            ServiceError::EmptyAnswer => AppError::BadRequest(MSG_EMPTY_ANSWER.into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("Operation timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorBody {
            success: false,
            message: self.message(),
        });

        (self.status(), payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_phrases_are_fixed() {
        let cases = [
            (ServiceError::Forbidden, StatusCode::FORBIDDEN, MSG_FORBIDDEN),
            (ServiceError::NotRunning, StatusCode::BAD_REQUEST, MSG_NOT_RUNNING),
            (ServiceError::NotEnrolled, StatusCode::FORBIDDEN, MSG_NOT_ENROLLED),
            (ServiceError::EmptyAnswer, StatusCode::BAD_REQUEST, MSG_EMPTY_ANSWER),
        ];

        for (err, status, message) in cases {
            let app: AppError = err.into();
            assert_eq!(app.status(), status);
            assert_eq!(app.message(), message);
        }
    }
}
