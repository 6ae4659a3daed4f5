use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::actions::json_error;

/// Failures surfaced by booking, payment, proof and SLA operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing caller identity")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("payment signature verification failed")]
    InvalidSignature,

    #[error("amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: i64, actual: i64 },

    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Upstream payment gateway failure, safe for the caller to retry
    #[error("payment provider error: {0}")]
    ProviderError(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::StateConflict(reason.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Unauthorized => StatusCode::UNAUTHORIZED,
            EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::InvalidSignature => StatusCode::UNAUTHORIZED,
            EngineError::AmountMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::StateConflict(_) => StatusCode::CONFLICT,
            EngineError::ProviderError(_) => StatusCode::BAD_GATEWAY,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Storage details stay in the logs
        let message = match &self {
            EngineError::Internal(e) => {
                tracing::error!(error = %e, "Internal error while handling request");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        json_error(status, &message).into_response()
    }
}
