//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; responses are JSON bodies of the shape
//! `{"error": "..."}` so clients always receive one typed failure.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;
use crate::services::orders::{PlaceOrderError, StatusUpdateError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    /// Bad request from client; detected before any mutation.
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Missing, invalid, or insufficiently privileged principal.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional stock decrement was rejected; carries the item name.
    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PlaceOrderError> for AppError {
    fn from(err: PlaceOrderError) -> Self {
        match err {
            PlaceOrderError::Invalid(e) => Self::Invalid(e.to_string()),
            PlaceOrderError::InsufficientStock(name) => Self::InsufficientStock(name),
            PlaceOrderError::Store(e) => Self::Store(e),
        }
    }
}

impl From<StatusUpdateError> for AppError {
    fn from(err: StatusUpdateError) -> Self {
        match err {
            StatusUpdateError::NotFound => Self::NotFound("Order not found".to_owned()),
            StatusUpdateError::Store(e) => Self::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Store(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Invalid(_) | Self::InsufficientStock(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::Invalid(msg) => msg.clone(),
            Self::Unauthorized => "Unauthorized".to_owned(),
            Self::NotFound(msg) => msg.clone(),
            Self::InsufficientStock(name) => format!("Insufficient stock for {name}"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
