//! Unified error handling for the HTTP surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::llm::ModelError;
use crate::services::{ChatError, OrderError};

/// Application-level error type.
///
/// Every route handler returns this; `IntoResponse` maps it to the wire
/// contract: `{ "error": message }` bodies, with a `"detail"` field added
/// for model failures and internal detail hidden for storage failures.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage failure; detail stays server-side.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// The chat model transport or API failed.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// No row behind the requested path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An order line asked for more units than are available.
    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request conflicts with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("resource not found".to_string()),
            RepositoryError::Conflict(message) => Self::Conflict(message),
            other => Self::Database(other),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(message) => Self::Validation(message),
            OrderError::ProductNotFound(label) => Self::NotFound(format!("product {label}")),
            OrderError::InsufficientStock(name) => Self::InsufficientStock(name),
            OrderError::Repository(repo) => repo.into(),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyHistory => Self::Validation(err.to_string()),
            ChatError::Repository(repo) => repo.into(),
            ChatError::Model(model) => Self::Model(model),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Database(_) | Self::Model(_)) {
            tracing::error!(error = %self, "request failed");
        }

        let status = match &self {
            Self::Database(_) | Self::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        };

        // Storage detail stays out of response bodies.
        let body = match &self {
            Self::Database(_) => json!({ "error": "Internal server error" }),
            Self::Model(e) => json!({
                "error": "Failed to process the chat message",
                "detail": e.to_string(),
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_strings() {
        let err = AppError::NotFound("order-123".to_string());
        assert_eq!(err.to_string(), "Not found: order-123");

        let err = AppError::InsufficientStock("iPad Air 5".to_string());
        assert_eq!(err.to_string(), "Insufficient stock for iPad Air 5");
    }

    #[test]
    fn test_status_mapping() {
        fn status_of(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        let cases = [
            (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (
                AppError::Validation("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::InsufficientStock("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Conflict("x".to_string()), StatusCode::CONFLICT),
            (
                AppError::Database(RepositoryError::DataCorruption("bad row".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Model(ModelError::Stream("reset".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, want) in cases {
            let got = status_of(err);
            assert_eq!(got, want);
        }
    }

    #[test]
    fn test_repository_errors_map_to_resource_semantics() {
        assert!(matches!(
            AppError::from(RepositoryError::NotFound),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(RepositoryError::Conflict("exists".to_string())),
            AppError::Conflict(_)
        ));
    }

    #[test]
    fn test_order_errors_map_to_statuses() {
        let err = AppError::from(OrderError::ProductNotFound("Flux Capacitor".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err = AppError::from(OrderError::InsufficientStock("iPad Air 5".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
