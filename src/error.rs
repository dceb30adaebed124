use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Failures of the credential layer: key material, signing, hashing.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("algorithm {0:?} is not supported for session tokens")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),
}

/// AuthError
///
/// Rejections produced by the authorization gate. Authentication failures (401)
/// are kept apart from authorization failures (403).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// StoreError
///
/// The named outcomes of content-store and listing operations. Everything except
/// `Storage` is an expected business condition; `Storage` wraps an unexpected
/// persistence fault whose transaction has been rolled back.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Resource not found")]
    NotFound,
    #[error("You are not allowed to modify this resource")]
    Forbidden,
    #[error("A blog with this title already exists")]
    DuplicateTitle,
    #[error("Status must be either 'draft' or 'published'")]
    InvalidStatus,
    #[error("Nothing to change")]
    NoOp,
    #[error("A user with this email or phone number already exists")]
    UserExists,
    #[error("{0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// AppError
///
/// Umbrella error returned by handlers. Each variant knows its status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("{0}")]
    Validation(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated | AuthError::InvalidToken | AuthError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Store(e) => e.status_code(),
        }
    }
}

impl StoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::Forbidden => StatusCode::FORBIDDEN,
            StoreError::DuplicateTitle | StoreError::InvalidStatus => StatusCode::BAD_REQUEST,
            StoreError::NoOp | StoreError::UserExists | StoreError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the error is a unique-constraint violation on the named constraint.
    pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
        match err {
            sqlx::Error::Database(db) => {
                db.is_unique_violation() && db.constraint() == Some(constraint)
            }
            _ => false,
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(e) => e.status_code(),
            AppError::Store(e) => e.status_code(),
            AppError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

fn error_response(status: StatusCode, detail: String) -> Response {
    (status, Json(ErrorResponse { detail })).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("auth gate failure: {:?}", self);
            return error_response(status, "Internal server error".to_string());
        }
        error_response(status, self.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details are logged, never sent to the client.
        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
            return error_response(status, "Internal server error".to_string());
        }
        error_response(status, self.to_string())
    }
}
