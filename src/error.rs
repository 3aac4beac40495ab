//! Error handling module
//!
//! Provides unified error types and handling for the entire application.

use crate::storage::StoreError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Which state rule a rejected write ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The member already has a vote on this proposal
    AlreadyVoted,
    /// Votes cannot be written once a proposal is closed
    ProposalClosed,
    /// Close was called on a proposal that is not open
    AlreadyClosed,
}

impl ConflictKind {
    pub fn code(&self) -> &'static str {
        match self {
            ConflictKind::AlreadyVoted => "ALREADY_VOTED",
            ConflictKind::ProposalClosed => "PROPOSAL_CLOSED",
            ConflictKind::AlreadyClosed => "ALREADY_CLOSED",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ConflictKind::AlreadyVoted => "member already voted on this proposal",
            ConflictKind::ProposalClosed => "proposal is closed",
            ConflictKind::AlreadyClosed => "proposal is already closed",
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(ConflictKind),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        // Unique violations reaching this point were not claimed by a service,
        // so there is no precise conflict kind to report.
        AppError::Storage(err.to_string())
    }
}

/// Well-formed JSON of the wrong shape (missing or mistyped fields) is invalid
/// input; anything that is not JSON at all is a bad request.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => AppError::Validation(err.body_text()),
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                None,
            ),
            AppError::Conflict(kind) => (
                StatusCode::CONFLICT,
                kind.code(),
                kind.message().to_string(),
                None,
            ),
            AppError::Storage(msg) => {
                error!("Storage failure: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_FAILURE",
                    "The storage backend failed to complete the request".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                None,
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(error_code.to_string()),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers and services
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> AppError {
    AppError::NotFound(msg.into())
}

/// Helper function to create a conflict error
pub fn conflict_error(kind: ConflictKind) -> AppError {
    AppError::Conflict(kind)
}
