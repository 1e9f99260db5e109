use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Closed set of failures the auth flows can surface. Callers pattern-match
/// on variants instead of inspecting message strings.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("Invalid credentials. Please try again.")]
    InvalidCredentials,
    #[error("refresh token is invalid or has been revoked")]
    InvalidToken,
    #[error("refresh token has expired")]
    TokenExpired,
    #[error("user not found")]
    UserNotFound,
    #[error("unique constraint violated: {0}")]
    Integrity(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("internal server error")]
    Internal { detail: Option<String> },
}

impl ServiceError {
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: Some(detail.into()),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => ServiceError::Unavailable(err.to_string()),
            other => ServiceError::internal(other.to_string()),
        }
    }
}

impl From<common_auth::AuthError> for ServiceError {
    fn from(err: common_auth::AuthError) -> Self {
        ServiceError::internal(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServiceError::DuplicateEmail => (StatusCode::BAD_REQUEST, "DUPLICATE_EMAIL"),
            ServiceError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            ServiceError::InvalidToken => (StatusCode::FORBIDDEN, "INVALID_TOKEN"),
            ServiceError::TokenExpired => (StatusCode::FORBIDDEN, "TOKEN_EXPIRED"),
            ServiceError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            ServiceError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ServiceError::Integrity(_) | ServiceError::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR")
            }
        };

        // Unclassified failures keep their detail out of production
        // responses; development builds return it verbatim.
        let details = match &self {
            ServiceError::Internal { detail } => {
                error!(detail = ?detail, "request failed with internal error");
                if cfg!(debug_assertions) {
                    detail.clone()
                } else {
                    None
                }
            }
            ServiceError::Integrity(_) | ServiceError::Unavailable(_) => {
                error!(error = %self, "request failed against storage");
                if cfg!(debug_assertions) {
                    Some(self.to_string())
                } else {
                    None
                }
            }
            other => Some(other.to_string()),
        };

        let body = ErrorBody {
            success: false,
            error: code,
            details,
        };
        (status, Json(body)).into_response()
    }
}
