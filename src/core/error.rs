//! Typed error handling for the order API
//!
//! Every failure surfaced to a caller is an [`OrderError`]. Backend layers
//! return `anyhow::Result`; the orchestration layer classifies those errors
//! into one of the kinds below before they reach the HTTP boundary.
//!
//! # Error kinds
//!
//! | Kind                  | HTTP | Meaning                                        |
//! |-----------------------|------|------------------------------------------------|
//! | `BAD_REQUEST`         | 400  | Input could not be bound or failed validation  |
//! | `NOT_FOUND`           | 404  | Delete/reconcile target does not exist         |
//! | `BACKEND_UNAVAILABLE` | 503  | Store or index unreachable or timed out        |
//! | `PARTIAL_FAILURE`     | 500  | One backend was written, the other was not     |
//! | `DECODE_FAILURE`      | 502  | A backend record did not decode into an order  |
//! | `INTERNAL_ERROR`      | 500  | A backend refused the call, or anything else   |
//!
//! # Example
//!
//! ```rust,ignore
//! match service.delete(&id).await {
//!     Ok(()) => println!("deleted"),
//!     Err(OrderError::PartialFailure { pending, .. }) => {
//!         println!("store row gone, {} still holds it", pending);
//!     }
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

use crate::core::service::Backend;

/// Write operation that can leave the two backends out of step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// The caller-facing error type
#[derive(Debug)]
pub enum OrderError {
    /// Malformed or unbindable input; nothing was attempted
    BadRequest { message: String },

    /// The targeted order does not exist
    NotFound { id: String },

    /// A backend call failed at the transport level or timed out
    BackendUnavailable { backend: Backend, reason: String },

    /// The store half of a write succeeded, the index half did not
    PartialFailure {
        id: String,
        operation: Operation,
        completed: Backend,
        pending: Backend,
    },

    /// A retrieved record could not be decoded into an order
    Decode { backend: Backend, message: String },

    /// Should not happen in normal operation
    Internal(String),
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderError::BadRequest { message } => write!(f, "Bad request: {}", message),
            OrderError::NotFound { id } => write!(f, "Order with id '{}' not found", id),
            OrderError::BackendUnavailable { backend, reason } => {
                write!(f, "The {} is unavailable: {}", backend, reason)
            }
            OrderError::PartialFailure {
                id,
                operation,
                completed,
                pending,
            } => write!(
                f,
                "Order '{}' {} succeeded in the {} but failed in the {}; reconcile required",
                id, operation, completed, pending
            ),
            OrderError::Decode { backend, message } => {
                write!(f, "Failed to decode order returned by the {}: {}", backend, message)
            }
            OrderError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for OrderError {}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error kind for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl OrderError {
    /// Shorthand for a [`OrderError::BadRequest`]
    pub fn bad_request(message: impl Into<String>) -> Self {
        OrderError::BadRequest {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrderError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            OrderError::NotFound { .. } => StatusCode::NOT_FOUND,
            OrderError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            OrderError::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            OrderError::Decode { .. } => StatusCode::BAD_GATEWAY,
            OrderError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error kind for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            OrderError::BadRequest { .. } => "BAD_REQUEST",
            OrderError::NotFound { .. } => "NOT_FOUND",
            OrderError::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            OrderError::PartialFailure { .. } => "PARTIAL_FAILURE",
            OrderError::Decode { .. } => "DECODE_FAILURE",
            OrderError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            OrderError::NotFound { id } => Some(serde_json::json!({ "id": id })),
            OrderError::BackendUnavailable { backend, .. } => {
                Some(serde_json::json!({ "backend": backend }))
            }
            OrderError::PartialFailure {
                id,
                operation,
                completed,
                pending,
            } => Some(serde_json::json!({
                "id": id,
                "operation": operation,
                "completed": completed,
                "pending": pending
            })),
            _ => None,
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for OrderError {
    fn from(err: validator::ValidationErrors) -> Self {
        OrderError::bad_request(err.to_string())
    }
}

impl From<axum::extract::rejection::JsonRejection> for OrderError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        OrderError::bad_request(format!("request body cannot be bound: {}", rejection.body_text()))
    }
}

/// A specialized Result type for order operations
pub type OrderResult<T> = Result<T, OrderError>;
