use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::claims::Role;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingToken,
    #[error("token is invalid, expired, or revoked")]
    InvalidToken,
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("invalid duration '{0}': expected <integer><unit> with unit s, m, h, or d")]
    InvalidDurationFormat(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("insufficient role")]
    Forbidden { required: Vec<Role> },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "MISSING_TOKEN"),
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            AuthError::InvalidToken | AuthError::InvalidClaim(_, _) => {
                (StatusCode::FORBIDDEN, "INVALID_TOKEN")
            }
            AuthError::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AuthError::InvalidDurationFormat(_) | AuthError::Signing(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR")
            }
        };

        let body = ErrorBody {
            success: false,
            error: code,
            details: Some(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
