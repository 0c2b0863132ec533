//! HTTP handlers for order operations

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

use crate::core::{Backend, CanonicalFilterRequest, Order, OrderCreateInput, OrderError};
use crate::orders::service::{OrderService, ReconcileOutcome};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
}

impl AppState {
    pub fn new(orders: OrderService) -> Self {
        Self {
            orders: Arc::new(orders),
        }
    }
}

/// Response for list and filter endpoints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub total_item_count: usize,
    pub data: Vec<Order>,
}

impl From<Vec<Order>> for ListResponse {
    fn from(data: Vec<Order>) -> Self {
        Self {
            total_item_count: data.len(),
            data,
        }
    }
}

/// Response for create and delete endpoints
#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: String,
    pub success: bool,
}

/// Response for the reconcile endpoint
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub id: String,
    pub outcome: ReconcileOutcome,
}

/// List every order from the document store
///
/// GET /api/orders
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<ListResponse>, OrderError> {
    let orders = state.orders.list_all().await?;
    Ok(Json(orders.into()))
}

/// Create an order
///
/// POST /api/orders
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<OrderCreateInput>, JsonRejection>,
) -> Result<(StatusCode, Json<IdResponse>), OrderError> {
    let Json(input) = payload?;
    let order = state.orders.create(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(IdResponse {
            id: order.id,
            success: true,
        }),
    ))
}

/// Filter orders against the backend named in the path
///
/// POST /api/orders/filter/{backend}
pub async fn filter_orders(
    State(state): State<AppState>,
    Path(backend): Path<String>,
    payload: Result<Json<CanonicalFilterRequest>, JsonRejection>,
) -> Result<Json<ListResponse>, OrderError> {
    let backend: Backend = backend.parse().map_err(OrderError::bad_request)?;
    run_filter(&state, backend, payload).await
}

/// POST /api/orders/GenericEndpoint
pub async fn filter_store(
    State(state): State<AppState>,
    payload: Result<Json<CanonicalFilterRequest>, JsonRejection>,
) -> Result<Json<ListResponse>, OrderError> {
    run_filter(&state, Backend::Store, payload).await
}

/// POST /api/orders/GenericEndpointElastic
pub async fn filter_index(
    State(state): State<AppState>,
    payload: Result<Json<CanonicalFilterRequest>, JsonRejection>,
) -> Result<Json<ListResponse>, OrderError> {
    run_filter(&state, Backend::Index, payload).await
}

async fn run_filter(
    state: &AppState,
    backend: Backend,
    payload: Result<Json<CanonicalFilterRequest>, JsonRejection>,
) -> Result<Json<ListResponse>, OrderError> {
    let Json(req) = payload?;
    let orders = state.orders.filter(backend, &req).await?;
    Ok(Json(orders.into()))
}

/// Delete an order from both backends
///
/// DELETE /api/orders/{id}
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IdResponse>, OrderError> {
    state.orders.delete(&id).await?;
    Ok(Json(IdResponse { id, success: true }))
}

/// Re-apply whatever the search index is missing for one order
///
/// POST /api/orders/{id}/reconcile
pub async fn reconcile_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReconcileResponse>, OrderError> {
    let outcome = state.orders.reconcile(&id).await?;
    Ok(Json(ReconcileResponse { id, outcome }))
}
