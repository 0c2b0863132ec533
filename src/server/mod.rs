//! HTTP server assembly
//!
//! `ServerBuilder` wires a document store and a search index into an
//! [`OrderService`](crate::orders::OrderService) and exposes it together with
//! health check routes.

pub mod builder;
pub mod router;

pub use builder::ServerBuilder;
pub use router::{SERVICE_NAME, build_order_routes, health_routes};
