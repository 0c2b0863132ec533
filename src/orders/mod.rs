//! Order orchestration and its HTTP handlers

pub mod handlers;
pub mod service;

pub use handlers::{AppState, IdResponse, ListResponse, ReconcileResponse};
pub use service::{DEFAULT_BACKEND_TIMEOUT, OrderService, ReconcileOutcome};
