// src/error.rs
// Crate-wide error type shared by the HTTP surface and the socket path.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("not a member of this chatroom")]
    NotMember,

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("shutting down")]
    ShuttingDown,

    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(#[from] sqlx::Error),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable string discriminant, used in logs and tests. Mirrors the
    /// kind names enumerated for the core's error handling design.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid-input",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::NotMember => "not-member",
            AppError::NotFound => "not-found",
            AppError::Conflict(_) => "conflict",
            AppError::ShuttingDown => "shutting-down",
            AppError::BrokerUnavailable(_) => "broker-unavailable",
            AppError::PersistenceFailed(_) => "persistence-failed",
            AppError::ProtocolError(_) => "protocol-error",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthenticated".to_string()),
            AppError::Forbidden | AppError::NotMember => {
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::ShuttingDown => {
                (StatusCode::SERVICE_UNAVAILABLE, "Shutting down".to_string())
            }
            AppError::BrokerUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Broker unavailable".to_string(),
            ),
            AppError::ProtocolError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PersistenceFailed(e) => {
                tracing::error!(error = %e, "persistence failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
