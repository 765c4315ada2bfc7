//! Error types surfaced by the HTTP handlers.
//!
//! Every failure is terminal for the request that triggered it: nothing is
//! retried or queued. Backend messages are passed through to the caller so the
//! dashboard can show them inline.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while serving a dashboard request.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input rejected before anything was written.
    #[error("{0}")]
    Validation(String),

    /// A Consume request asked for more than the known stock.
    #[error("insufficient stock for {material}: available {available}kg")]
    InsufficientStock { material: String, available: Decimal },

    /// The referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The ledger database rejected the operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The telemetry backend rejected the operation or was unreachable.
    #[error("telemetry backend error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The report sheet could not be rendered.
    #[error("export error: {0}")]
    Export(#[from] csv::Error),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_error_status_codes() {
        // ---
        assert_eq!(
            AppError::Validation("quantity must be positive".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InsufficientStock {
                material: "Corn".into(),
                available: Decimal::from(20),
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::NotFound("transaction".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(csv::Error::from(std::io::Error::other("disk full"))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_insufficient_stock_message() {
        // ---
        let err = AppError::InsufficientStock {
            material: "Rice Husk".into(),
            available: Decimal::new(205, 1),
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for Rice Husk: available 20.5kg"
        );
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
