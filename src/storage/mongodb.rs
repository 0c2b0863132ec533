//! MongoDB document store using the official MongoDB async driver.
//!
//! # Storage model
//!
//! All orders live in one collection. Orders are serialized via
//! `serde_json::Value` as an intermediate format and then converted to BSON,
//! so timestamps are stored as RFC 3339 strings and the `id` field becomes
//! MongoDB's `_id`.
//!
//! Queries arrive precompiled as a [`StoreQuery`]: the predicate document goes
//! to `find` unchanged and projection/sort go into `FindOptions`.

use crate::core::document::json_to_document;
use crate::core::order::Order;
use crate::core::service::{Backend, BackendRejection, OrderStore};
use crate::query::StoreQuery;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind, RETRYABLE_WRITE_ERROR};
use mongodb::options::FindOptions;
use mongodb::{Client, Collection, Database, IndexModel};

/// Order store backed by a single MongoDB collection
#[derive(Clone, Debug)]
pub struct MongoOrderStore {
    database: Database,
    collection: String,
}

impl MongoOrderStore {
    /// Create a store over `collection` in an already connected database
    pub fn new(database: Database, collection: impl Into<String>) -> Self {
        Self {
            database,
            collection: collection.into(),
        }
    }

    /// Connect to `uri` and open `database.collection`
    ///
    /// The driver connects lazily; the first operation surfaces an
    /// unreachable server.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| anyhow!("Failed to create MongoDB client for {}: {}", uri, e))?;

        Ok(Self::new(client.database(database), collection))
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self) -> Collection<Document> {
        self.database.collection(&self.collection)
    }

    /// Create secondary indexes for the commonly filtered fields.
    ///
    /// Idempotent; MongoDB ignores indexes that already exist.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let indexes = vec![
            IndexModel::builder().keys(doc! { "status": 1 }).build(),
            IndexModel::builder().keys(doc! { "userId": 1 }).build(),
            IndexModel::builder().keys(doc! { "city": 1 }).build(),
            IndexModel::builder().keys(doc! { "createdAt": -1 }).build(),
        ];

        self.collection()
            .create_indexes(indexes)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to create indexes on {} collection: {}",
                    self.collection,
                    e
                )
            })?;

        Ok(())
    }
}

/// Translate compiled retrieval options into driver options
fn find_options(query: &StoreQuery) -> FindOptions {
    let mut options = FindOptions::default();
    options.projection = query.options.projection.clone();
    options.sort = query.options.sort.clone();
    options
}

/// Classify a driver error
///
/// Command and write errors the server will repeat on retry are a
/// [`BackendRejection`]; everything else is treated as transport trouble.
fn store_error(context: impl std::fmt::Display, e: MongoError) -> anyhow::Error {
    let refused = matches!(*e.kind, ErrorKind::Command(_) | ErrorKind::Write(_))
        && !e.contains_label(RETRYABLE_WRITE_ERROR);
    if refused {
        BackendRejection::new(Backend::Store, format!("{}: {}", context, e)).into()
    } else {
        anyhow!("{}: {}", context, e)
    }
}

#[async_trait]
impl OrderStore for MongoOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let json = serde_json::to_value(order)
            .map_err(|e| anyhow!("Failed to serialize order: {}", e))?;
        let doc = json_to_document(json)?;

        self.collection()
            .insert_one(doc)
            .await
            .map_err(|e| store_error(format!("Failed to insert order {}", order.id), e))?;

        Ok(())
    }

    async fn find(&self, query: &StoreQuery) -> Result<Vec<Document>> {
        let cursor = self
            .collection()
            .find(query.filter.clone())
            .with_options(find_options(query))
            .await
            .map_err(|e| store_error("Failed to query orders", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| store_error("Failed to read order cursor", e))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        self.collection()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| store_error(format!("Failed to get order {}", id), e))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = self
            .collection()
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| store_error(format!("Failed to delete order {}", id), e))?;

        Ok(result.deleted_count > 0)
    }
}
