//! Error types shared by the stores, the account endpoints and the OAuth2 engine.
//!
//! Every error that reaches a client is rendered as
//! `{"error": "<code>", "error_description": "<text>"}`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use sea_orm::SqlErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Failure of a backing store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("store has been closed")]
    Closed,
}

impl StorageError {
    /// A write collided with a uniqueness rule of the store.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StorageError::Conflict(_) => true,
            StorageError::Database(e) => {
                matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
            }
            _ => false,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine readable error code (e.g. "invalid_client")
    pub error: String,
    /// Human readable description
    pub error_description: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: description.into(),
        }
    }
}

/// Password verification outcome other than success.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Unknown email or wrong password. The two are deliberately not distinguished.
    #[error("invalid email or password")]
    AuthFailure,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Session lookup outcome other than success.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors surfaced by the token grant and bearer validation pipeline.
///
/// Codes follow RFC 6749 section 5.2 and RFC 6750 section 3.1.
#[derive(Debug, Error)]
pub enum GrantError {
    #[error("invalid_request: {0}")]
    InvalidRequest(&'static str),
    #[error("invalid_client")]
    InvalidClient,
    #[error("invalid_grant: {0}")]
    InvalidGrant(&'static str),
    #[error("unsupported_grant_type")]
    UnsupportedGrantType,
    #[error("invalid_token: {0}")]
    InvalidToken(&'static str),
    #[error("server_error: {0}")]
    Server(#[from] StorageError),
}

impl GrantError {
    pub fn code(&self) -> &'static str {
        match self {
            GrantError::InvalidRequest(_) => "invalid_request",
            GrantError::InvalidClient => "invalid_client",
            GrantError::InvalidGrant(_) => "invalid_grant",
            GrantError::UnsupportedGrantType => "unsupported_grant_type",
            GrantError::InvalidToken(_) => "invalid_token",
            GrantError::Server(_) => "server_error",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            GrantError::InvalidRequest(desc)
            | GrantError::InvalidGrant(desc)
            | GrantError::InvalidToken(desc) => desc,
            GrantError::InvalidClient => "Client authentication failed",
            GrantError::UnsupportedGrantType => {
                "The authorization grant type is not supported by the authorization server"
            }
            GrantError::Server(_) => {
                "The authorization server encountered an unexpected condition that prevented it from fulfilling the request"
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GrantError::InvalidRequest(_)
            | GrantError::InvalidGrant(_)
            | GrantError::UnsupportedGrantType => StatusCode::BAD_REQUEST,
            GrantError::InvalidClient | GrantError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            GrantError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Routine client mistakes that are not worth a log line.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            GrantError::InvalidRequest(_) | GrantError::UnsupportedGrantType
        )
    }
}

impl IntoResponse for GrantError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse::new(self.code(), self.description());
        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if matches!(self, GrantError::InvalidToken(_)) {
            headers.insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer error=\"invalid_token\""),
            );
        }
        response
    }
}

/// Errors returned by the account endpoints and client issuance.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("user already exists")]
    UserExists,
    #[error("invalid email or password")]
    AccessDenied,
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::AuthFailure => ApiError::AccessDenied,
            CredentialError::Storage(e) => ApiError::Storage(e),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => ApiError::Forbidden,
            SessionError::Storage(e) => ApiError::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("invalid_request", msg),
            ),
            ApiError::UserExists => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "invalid_request",
                    "if this user exists, please try again with proper credentials",
                ),
            ),
            ApiError::AccessDenied => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("access_denied", "invalid email or password"),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("forbidden", "a valid session is required"),
            ),
            ApiError::Storage(e) => {
                tracing::error!(error = %e, "internal storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("server_error", "internal error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
