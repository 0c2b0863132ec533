//! Order orchestration over the document store and the search index
//!
//! Writes go to the store first and to the index second. The two steps are
//! not transactional: when the second one fails the call reports
//! [`OrderError::PartialFailure`] and [`OrderService::reconcile`] re-applies
//! whatever the index is missing. Reads hit exactly the backend the caller
//! chose; the two are never merged.

use crate::core::error::{Operation, OrderError, OrderResult};
use crate::core::filter::CanonicalFilterRequest;
use crate::core::normalize::{BackendResult, normalize};
use crate::core::order::{Order, OrderCreateInput};
use crate::core::service::{Backend, BackendRejection, OrderIndex, OrderStore};
use crate::query::{StoreQuery, compile_for_index, compile_for_store};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Per-call backend timeout used unless configured otherwise
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(20);

/// What [`OrderService::reconcile`] did to bring the index in line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileOutcome {
    /// The stored order was written to the index
    Reindexed,
    /// The order is gone from the store and was dropped from the index
    Removed,
}

/// Create, list, filter and delete orders across both backends
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    index: Arc<dyn OrderIndex>,
    timeout: Duration,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, index: Arc<dyn OrderIndex>) -> Self {
        Self {
            store,
            index,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Bound every backend call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Every stored order in store order
    pub async fn list_all(&self) -> OrderResult<Vec<Order>> {
        let docs = self
            .guarded(Backend::Store, "list", self.store.find(&StoreQuery::all()))
            .await?;
        normalize(BackendResult::Store(docs))
    }

    /// Run a filter request against the chosen backend
    ///
    /// An empty result is a success.
    pub async fn filter(
        &self,
        backend: Backend,
        req: &CanonicalFilterRequest,
    ) -> OrderResult<Vec<Order>> {
        req.validate()?;

        let raw = match backend {
            Backend::Store => {
                let query = compile_for_store(req);
                tracing::debug!(filter = %query.filter, "store query compiled");
                let docs = self
                    .guarded(backend, "filter", self.store.find(&query))
                    .await?;
                BackendResult::Store(docs)
            }
            Backend::Index => {
                let query = compile_for_index(req);
                tracing::debug!(body = %query.body(), "index query compiled");
                let response = self
                    .guarded(backend, "filter", self.index.search(&query))
                    .await?;
                BackendResult::Index(response)
            }
        };

        normalize(raw)
    }

    /// Persist a new order, then index it
    pub async fn create(&self, input: OrderCreateInput) -> OrderResult<Order> {
        let order = Order::from_input(input, Utc::now())?;

        self.guarded(Backend::Store, "insert", self.store.insert(&order))
            .await?;

        if self
            .guarded(Backend::Index, "index", self.index.put(&order))
            .await
            .is_err()
        {
            return Err(self.partial_failure(&order.id, Operation::Create));
        }

        tracing::info!(id = %order.id, total = order.total, "order created");
        Ok(order)
    }

    /// Delete from the store, then from the index
    ///
    /// An id unknown to the store is `NotFound` and the index is left alone.
    /// An index that no longer holds the order counts as consistent.
    pub async fn delete(&self, id: &str) -> OrderResult<()> {
        let deleted = self
            .guarded(Backend::Store, "delete", self.store.delete(id))
            .await?;
        if !deleted {
            return Err(OrderError::NotFound { id: id.to_string() });
        }

        match self
            .guarded(Backend::Index, "delete", self.index.delete(id))
            .await
        {
            Ok(indexed) => {
                if !indexed {
                    tracing::debug!(id, "order was not indexed");
                }
                tracing::info!(id, "order deleted");
                Ok(())
            }
            Err(_) => Err(self.partial_failure(id, Operation::Delete)),
        }
    }

    /// Bring the index in line with the store for one order
    ///
    /// Safe to repeat. Fails with `NotFound` only when neither backend knows
    /// the id.
    pub async fn reconcile(&self, id: &str) -> OrderResult<ReconcileOutcome> {
        let stored = self
            .guarded(Backend::Store, "lookup", self.store.find_by_id(id))
            .await?;

        match stored {
            Some(doc) => {
                let order = normalize(BackendResult::Store(vec![doc]))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| OrderError::Internal("decoded order vanished".to_string()))?;

                self.guarded(Backend::Index, "reindex", self.index.put(&order))
                    .await?;
                tracing::info!(id, "order reindexed");
                Ok(ReconcileOutcome::Reindexed)
            }
            None => {
                let removed = self
                    .guarded(Backend::Index, "delete", self.index.delete(id))
                    .await?;
                if !removed {
                    return Err(OrderError::NotFound { id: id.to_string() });
                }
                tracing::info!(id, "stale order removed from index");
                Ok(ReconcileOutcome::Removed)
            }
        }
    }

    fn partial_failure(&self, id: &str, operation: Operation) -> OrderError {
        tracing::warn!(
            id,
            %operation,
            pending = %Backend::Index,
            "store and index out of step"
        );
        OrderError::PartialFailure {
            id: id.to_string(),
            operation,
            completed: Backend::Store,
            pending: Backend::Index,
        }
    }

    /// Run one backend call under the timeout and classify its failure
    ///
    /// A call the backend refused is `Internal`; transport errors and
    /// timeouts are `BackendUnavailable`. The underlying cause is logged,
    /// never returned.
    async fn guarded<T, F>(&self, backend: Backend, action: &str, call: F) -> OrderResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.downcast_ref::<BackendRejection>().is_some() => {
                tracing::error!(%backend, action, error = %e, "backend rejected call");
                Err(OrderError::Internal(format!(
                    "the {} rejected the {}",
                    backend, action
                )))
            }
            Ok(Err(e)) => {
                tracing::error!(%backend, action, error = %e, "backend call failed");
                Err(OrderError::BackendUnavailable {
                    backend,
                    reason: format!("{} failed", action),
                })
            }
            Err(_) => {
                tracing::error!(%backend, action, timeout = ?self.timeout, "backend call timed out");
                Err(OrderError::BackendUnavailable {
                    backend,
                    reason: format!("timed out after {}s", self.timeout.as_secs_f64()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryOrderIndex, InMemoryOrderStore};
    use serde_json::json;

    fn service() -> (OrderService, InMemoryOrderStore, InMemoryOrderIndex) {
        let store = InMemoryOrderStore::new();
        let index = InMemoryOrderIndex::new();
        let service = OrderService::new(Arc::new(store.clone()), Arc::new(index.clone()));
        (service, store, index)
    }

    fn input(status: &str) -> OrderCreateInput {
        serde_json::from_value(json!({
            "userId": "u1",
            "status": status,
            "city": "Izmir",
            "lineItems": [
                {"name": "A", "quantity": 2, "price": 5.0},
                {"name": "B", "quantity": 1, "price": 3.0}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_writes_both_backends() {
        let (service, store, index) = service();
        let order = service.create(input("Shipped")).await.unwrap();

        assert_eq!(order.total, 13.0);
        assert_eq!(order.created_at, order.updated_at);
        assert_eq!(store.len(), 1);
        assert!(index.contains(&order.id));
    }

    #[tokio::test]
    async fn test_list_all_decodes_stored_orders() {
        let (service, _, _) = service();
        let first = service.create(input("Shipped")).await.unwrap();
        let second = service.create(input("Pending")).await.unwrap();

        let orders = service.list_all().await.unwrap();
        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
        assert_eq!(orders[0].total, first.total);
        assert_eq!(orders[0].line_items, first.line_items);
    }

    #[tokio::test]
    async fn test_filter_rejects_invalid_request_before_querying() {
        let (service, _, _) = service();
        let req = CanonicalFilterRequest::new().exact("status", Vec::<String>::new());
        let err = service.filter(Backend::Index, &req).await.unwrap_err();
        assert_eq!(err.error_code(), "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_zero_rows_is_success() {
        let (service, _, _) = service();
        service.create(input("Shipped")).await.unwrap();

        let req = CanonicalFilterRequest::new().exact("status", ["Cancelled"]);
        assert!(service.filter(Backend::Store, &req).await.unwrap().is_empty());
        assert!(service.filter(Backend::Index, &req).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_from_both() {
        let (service, store, index) = service();
        let order = service.create(input("Shipped")).await.unwrap();

        service.delete(&order.id).await.unwrap();
        assert!(store.is_empty());
        assert!(!index.contains(&order.id));

        let err = service.delete(&order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_index_entry() {
        let (service, _, index) = service();
        let order = service.create(input("Shipped")).await.unwrap();
        index.delete(&order.id).await.unwrap();

        service.delete(&order.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_reindexes_and_removes() {
        let (service, store, index) = service();
        let order = service.create(input("Shipped")).await.unwrap();

        index.delete(&order.id).await.unwrap();
        assert_eq!(
            service.reconcile(&order.id).await.unwrap(),
            ReconcileOutcome::Reindexed
        );
        assert!(index.contains(&order.id));
        assert_eq!(
            service.reconcile(&order.id).await.unwrap(),
            ReconcileOutcome::Reindexed
        );

        store.delete(&order.id).await.unwrap();
        assert_eq!(
            service.reconcile(&order.id).await.unwrap(),
            ReconcileOutcome::Removed
        );
        assert!(!index.contains(&order.id));

        let err = service.reconcile(&order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_default_timeout() {
        let (service, _, _) = service();
        assert_eq!(service.timeout(), Duration::from_secs(20));
        let service = service.with_timeout(Duration::from_millis(50));
        assert_eq!(service.timeout(), Duration::from_millis(50));
    }
}
