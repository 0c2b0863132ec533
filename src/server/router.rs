//! Route table for the order API

use crate::orders::handlers::{
    AppState, create_order, delete_order, filter_index, filter_orders, filter_store, list_orders,
    reconcile_order,
};
use axum::{
    Json, Router,
    routing::{delete, get, post},
};
use serde_json::{Value, json};

/// Name reported by the health endpoints
pub const SERVICE_NAME: &str = "order-api";

/// Build the order routes
///
/// - GET    /api/orders                       - List every stored order
/// - POST   /api/orders                       - Create an order
/// - POST   /api/orders/filter/{backend}      - Filter against `store` or `index`
/// - POST   /api/orders/GenericEndpoint       - Filter against the store
/// - POST   /api/orders/GenericEndpointElastic - Filter against the index
/// - DELETE /api/orders/{id}                  - Delete from both backends
/// - POST   /api/orders/{id}/reconcile        - Re-sync the index for one order
pub fn build_order_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/filter/{backend}", post(filter_orders))
        .route("/api/orders/GenericEndpoint", post(filter_store))
        .route("/api/orders/GenericEndpointElastic", post(filter_index))
        .route("/api/orders/{id}", delete(delete_order))
        .route("/api/orders/{id}/reconcile", post(reconcile_order))
        .with_state(state)
}

/// Build health check routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderService;
    use crate::storage::{InMemoryOrderIndex, InMemoryOrderStore};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let service = OrderService::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryOrderIndex::new()),
        );
        health_routes().merge(build_order_routes(AppState::new(service)))
    }

    #[tokio::test]
    async fn test_healthz_reports_service_name() {
        let response = app()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "status": "ok", "service": SERVICE_NAME }));
    }

    #[tokio::test]
    async fn test_filter_without_body_is_bad_request() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/orders/filter/store")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_unknown_order_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/orders/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
