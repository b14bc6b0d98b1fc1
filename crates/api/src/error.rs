//! Error responses.
//!
//! Every failure leaves the API as `{ "error": CODE, "message": ... }` with
//! the status of its error class.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use banka_core::LedgerError;
use banka_shared::AppError;
use serde_json::json;
use tracing::error;

/// An error ready to be rendered as an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status.
    pub status: StatusCode,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = status_from(err.http_status_code());
        if status.is_server_error() {
            error!(error = %err, "Ledger request failed");
        }
        Self {
            status,
            code: err.error_code(),
            // Storage details stay in the logs.
            message: if err.is_storage() {
                "The ledger is temporarily unavailable".to_string()
            } else {
                err.to_string()
            },
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        if err.is_server_error() {
            error!(error = %err, "Request failed");
        }
        Self {
            status: status_from(err.status_code()),
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.code, "message": self.message })),
        )
            .into_response()
    }
}
