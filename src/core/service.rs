//! Backend traits for the document store and the search index

use crate::core::order::Order;
use crate::query::{SearchQuery, StoreQuery};
use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which backend answers (or failed to answer) a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Record-oriented store queried with predicate + cursor options
    Store,
    /// Boolean/full-text index queried with a query document
    Index,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Store => write!(f, "document store"),
            Backend::Index => write!(f, "search index"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "store" | "mongo" | "mongodb" => Ok(Backend::Store),
            "index" | "elastic" | "elasticsearch" => Ok(Backend::Index),
            other => Err(format!(
                "unknown backend '{}', expected 'store' or 'index'",
                other
            )),
        }
    }
}

/// A backend understood a call and refused it
///
/// Carried inside `anyhow::Error` for deterministic refusals such as an
/// invalid query, a mapping conflict or a duplicate key. Transport failures
/// stay plain errors.
#[derive(Debug, thiserror::Error)]
#[error("the {backend} rejected the request: {reason}")]
pub struct BackendRejection {
    pub backend: Backend,
    pub reason: String,
}

impl BackendRejection {
    pub fn new(backend: Backend, reason: impl Into<String>) -> Self {
        Self {
            backend,
            reason: reason.into(),
        }
    }
}

/// Document store boundary
///
/// Implementations return raw documents; decoding into [`Order`] belongs to
/// the result normalizer so that both backends fail decoding the same way.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order keyed by its id
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Run a compiled find and drain the cursor, preserving backend order
    async fn find(&self, query: &StoreQuery) -> Result<Vec<Document>>;

    /// Fetch one raw document by id
    async fn find_by_id(&self, id: &str) -> Result<Option<Document>>;

    /// Delete by id; `false` when nothing matched
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Search index boundary
#[async_trait]
pub trait OrderIndex: Send + Sync {
    /// Index (or re-index) an order under its id
    async fn put(&self, order: &Order) -> Result<()>;

    /// Execute a compiled query and return the raw search response
    async fn search(&self, query: &SearchQuery) -> Result<serde_json::Value>;

    /// Remove by id; `false` when the document was not indexed
    async fn delete(&self, id: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("store".parse::<Backend>().unwrap(), Backend::Store);
        assert_eq!("Index".parse::<Backend>().unwrap(), Backend::Index);
        assert_eq!("elastic".parse::<Backend>().unwrap(), Backend::Index);
        assert!("redis".parse::<Backend>().is_err());
    }

    #[test]
    fn test_rejection_survives_anyhow() {
        let err: anyhow::Error = BackendRejection::new(Backend::Index, "bad sort").into();
        let rejection = err.downcast_ref::<BackendRejection>().unwrap();
        assert_eq!(rejection.backend, Backend::Index);
        assert_eq!(err.to_string(), "the search index rejected the request: bad sort");
    }

    #[test]
    fn test_backend_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Backend::Store).unwrap(), "store");
        assert_eq!(serde_json::to_value(Backend::Index).unwrap(), "index");
    }
}
