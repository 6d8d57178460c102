use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::result::ApiResponse;

#[derive(Debug)]
pub enum AppError {
    /// Malformed or missing input; carries one message per failed check.
    Validation(Vec<String>),
    /// Duplicate email, SKU, role assignment and the like.
    Conflict(String),
    /// Login failure; the cause is deliberately not distinguishable.
    InvalidCredentials,
    /// Expired, revoked or malformed token presented to an auth operation.
    InvalidToken(String),
    /// Missing or unverifiable credentials on a protected route.
    Unauthorized,
    Forbidden,
    NotFound(String),
    /// Unexpected storage or crypto failure; logged, never shown to clients.
    Internal(anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(vec![message.into()])
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        AppError::Internal(err.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.into())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(err.into())
    }
}

/// True when the database rejected the statement over a unique constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// True when the database rejected the statement over a foreign key.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, "Validation failed".to_string(), errors)
            }
            AppError::Conflict(message) => (StatusCode::BAD_REQUEST, message, Vec::new()),
            AppError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                "Invalid email or password".to_string(),
                Vec::new(),
            ),
            AppError::InvalidToken(message) => (StatusCode::BAD_REQUEST, message, Vec::new()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized".to_string(),
                Vec::new(),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string(), Vec::new()),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message, Vec::new()),
            AppError::Internal(err) => {
                tracing::error!("internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Vec::new(),
                )
            }
        };

        let body = Json(ApiResponse::<()>::error_with(&message, errors));
        (status, body).into_response()
    }
}
