//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rowpilot_common::RowpilotError;
use thiserror::Error;

use crate::api::response::ErrorResponse;

/// Result type alias for request handlers
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Domain(#[from] RowpilotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// An error carrying extra context for the client, such as the preview to re-render
    #[error("{source}")]
    WithDetails {
        source: Box<AppError>,
        details: serde_json::Value,
    },
}

impl AppError {
    /// Attach client-facing details to this error
    pub fn with_details(self, details: serde_json::Value) -> Self {
        AppError::WithDetails {
            source: Box::new(self),
            details,
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message.clone()),
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.clone())
            },
            AppError::Domain(err) => match err {
                RowpilotError::UnsupportedFormat { .. } => {
                    (StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT", err.to_string())
                },
                RowpilotError::Parse { .. } | RowpilotError::RaggedTable { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "PARSE_ERROR", err.to_string())
                },
                RowpilotError::Io(e) => {
                    tracing::error!(error = ?e, "IO error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An IO error occurred".to_string(),
                    )
                },
                RowpilotError::Serialization(e) => {
                    tracing::error!(error = ?e, "Serialization error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                },
                _ => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", err.to_string()),
            },
            AppError::Io(e) => {
                tracing::error!(error = ?e, "IO error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An IO error occurred".to_string(),
                )
            },
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            },
            AppError::WithDetails { source, .. } => source.parts(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = match self {
            AppError::WithDetails { details, .. } => {
                ErrorResponse::with_details(code, message, details)
            },
            _ => ErrorResponse::new(code, message),
        };

        (status, Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Background task failed: {}", err))
    }
}
