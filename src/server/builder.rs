//! ServerBuilder for fluent API to build the HTTP server

use super::router::{build_order_routes, health_routes};
use crate::core::service::{OrderIndex, OrderStore};
use crate::orders::{AppState, DEFAULT_BACKEND_TIMEOUT, OrderService};
use anyhow::{Result, anyhow};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for the order API server
///
/// # Example
///
/// ```ignore
/// ServerBuilder::new()
///     .with_store(InMemoryOrderStore::new())
///     .with_index(InMemoryOrderIndex::new())
///     .serve("127.0.0.1:8011")
///     .await?;
/// ```
pub struct ServerBuilder {
    store: Option<Arc<dyn OrderStore>>,
    index: Option<Arc<dyn OrderIndex>>,
    timeout: Duration,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            store: None,
            index: None,
            timeout: DEFAULT_BACKEND_TIMEOUT,
            custom_routes: Vec::new(),
        }
    }

    /// Set the document store (required)
    pub fn with_store(mut self, store: impl OrderStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set the search index (required)
    pub fn with_index(mut self, index: impl OrderIndex + 'static) -> Self {
        self.index = Some(Arc::new(index));
        self
    }

    /// Per-call backend timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add routes outside the order API, e.g. metrics or admin endpoints
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the router with tracing and CORS layers applied
    pub fn build(self) -> Result<Router> {
        let store = self
            .store
            .ok_or_else(|| anyhow!("A document store is required"))?;
        let index = self
            .index
            .ok_or_else(|| anyhow!("A search index is required"))?;

        let service = OrderService::new(store, index).with_timeout(self.timeout);

        let mut app = health_routes().merge(build_order_routes(AppState::new(service)));
        for custom in self.custom_routes {
            app = app.merge(custom);
        }

        Ok(app
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds to `addr`, serves requests and stops on SIGTERM or Ctrl+C.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
