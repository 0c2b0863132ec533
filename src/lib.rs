//! # Order API
//!
//! Order management over two independently queried backends: a MongoDB
//! document store and an Elasticsearch search index.
//!
//! ## Features
//!
//! - **One filter, two query languages**: a [`CanonicalFilterRequest`](core::CanonicalFilterRequest)
//!   is lowered to a backend-neutral plan and encoded either as a find
//!   predicate with options or as a boolean search query
//! - **Stable result shape**: both backends normalize into the same `Order`
//! - **Visible partial failures**: store-then-index writes report which half
//!   is pending and can be reconciled per order
//! - **Deterministic multi-key sort**: sort keys are an ordered list end to end
//! - **In-memory backends**: the same compiled queries run without live services
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use order_api::prelude::*;
//!
//! let service = OrderService::new(
//!     Arc::new(InMemoryOrderStore::new()),
//!     Arc::new(InMemoryOrderIndex::new()),
//! );
//!
//! let req = CanonicalFilterRequest::new()
//!     .exact("status", ["Shipped", "Delivered"])
//!     .sort_by(SortKey::desc("total"));
//!
//! let from_store = service.filter(Backend::Store, &req).await?;
//! let from_index = service.filter(Backend::Index, &req).await?;
//! ```

pub mod config;
pub mod core;
pub mod orders;
pub mod query;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Types ===
    pub use crate::core::{
        Backend, BackendRejection, CanonicalFilterRequest, ErrorResponse, LineItem, Operation, Order,
        OrderCreateInput, OrderError, OrderIndex, OrderResult, OrderStore, SortDirection, SortKey,
    };

    // === Query Compilation ===
    pub use crate::query::{
        FilterPlan, SearchQuery, StoreQuery, compile_for_index, compile_for_store,
    };

    // === Orchestration ===
    pub use crate::orders::{AppState, OrderService, ReconcileOutcome};

    // === Storage ===
    pub use crate::storage::{
        ElasticOrderIndex, InMemoryOrderIndex, InMemoryOrderStore, MongoOrderStore,
    };

    // === Configuration ===
    pub use crate::config::{AppConfig, ConfigError, ConfigFile};

    // === Server ===
    pub use crate::server::ServerBuilder;

    // === Re-exports from dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
