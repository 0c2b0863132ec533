//! Core module containing the order model, the canonical filter request,
//! backend traits and error handling

pub mod document;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod order;
pub mod service;

pub use error::{ErrorResponse, Operation, OrderError, OrderResult};
pub use filter::{CanonicalFilterRequest, SortDirection, SortKey};
pub use normalize::{BackendResult, normalize};
pub use order::{LineItem, Order, OrderCreateInput};
pub use service::{Backend, BackendRejection, OrderIndex, OrderStore};
