//! Errors returned by HTTP handlers and their JSON rendering
//! (`{"code": "...", "message": "..."}`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::pipeline::ProcessingError;
use crate::repository::RepositoryError;
use crate::services::ai_client::AiError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unprocessable: {0}")]
    Unprocessable(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error("database failure: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Status, machine code and the message safe to show a client.
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        const HIDDEN: &str = "An internal error occurred";
        match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            Self::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE", msg),
            Self::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", HIDDEN),
            Self::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", HIDDEN),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(code, error = ?self, "Request failed");
        } else {
            tracing::warn!(code, error = %self, "Request rejected");
        }

        (status, Json(ErrorBody { code, message })).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(id) => Self::NotFound(format!("Document {id} not found")),
            RepositoryError::Database(e) => Self::Database(e),
            other => Self::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(reference) => {
                Self::NotFound(format!("Stored file {reference} not found"))
            }
            StorageError::Unavailable(msg) => Self::ServiceUnavailable(msg),
            other => Self::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<AiError> for ApiError {
    fn from(e: AiError) -> Self {
        match e {
            AiError::NotConfigured => {
                Self::ServiceUnavailable("The AI assistant is not configured".to_string())
            }
            other => Self::ServiceUnavailable(format!("AI service error: {other}")),
        }
    }
}

impl From<ProcessingError> for ApiError {
    fn from(e: ProcessingError) -> Self {
        match e {
            ProcessingError::NotFound(id) => Self::NotFound(format!("Document {id} not found")),
            ProcessingError::Store(e) => e.into(),
            ProcessingError::Storage(e) => e.into(),
            ProcessingError::Ai(e) => e.into(),
            ProcessingError::NotReady(status) => {
                Self::conflict(format!("Document is {status}; it must be completed first"))
            }
            ProcessingError::EmptyExtraction => {
                Self::Unprocessable("The document has no readable text".to_string())
            }
            other => Self::Internal(anyhow::Error::new(other)),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
