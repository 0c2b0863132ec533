//! Filter translation layer
//!
//! One canonical request, two executable queries:
//!
//! ```text
//! CanonicalFilterRequest ──► FilterPlan ──┬─► encode_store ──► StoreQuery  (predicate + options)
//!                                         └─► encode_index ──► SearchQuery (bool query document)
//! ```
//!
//! Both compilers are pure functions over a validated request and are safe to
//! call concurrently.

pub mod index;
pub mod plan;
pub mod store;

pub use index::{MAX_RESULT_WINDOW, SearchQuery, compile_for_index, encode_index};
pub use plan::{Clause, FilterPlan};
pub use store::{RetrievalOptions, StoreQuery, compile_for_store, encode_store};
