//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (subscription, tracing, request ID)
//! - Serve the frontend bundle for every non-API path
//! - Bind server to listener and drain on shutdown
//!
//! No request timeout is installed: a mutating handler must never be
//! dropped between its file writes and the daemon restart.

use axum::{
    middleware,
    routing::{any, get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::config::ManagerConfig;
use crate::http::handlers::*;
use crate::http::subscription::subscription_middleware;
use crate::lifecycle::ShutdownSignal;
use crate::manager::Manager;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
}

/// HTTP server for the management API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server over a shared manager.
    pub fn new(config: &ManagerConfig, manager: Arc<Manager>) -> Self {
        let state = AppState { manager };
        let router = Self::build_router(&config.storage.frontend_dist(), state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(frontend_dist: &Path, state: AppState) -> Router {
        let frontend = ServeDir::new(frontend_dist)
            .fallback(ServeFile::new(frontend_dist.join("index.html")));

        Router::new()
            .route("/api/list", get(list_clients))
            .route("/api/vmess", post(create_client).delete(clear_clients))
            .route("/api/vmess/{name}", get(get_client).delete(delete_client))
            .route("/api/settings", get(get_settings).post(update_settings))
            .route("/api/health", get(health))
            .route("/api", any(api_not_found))
            .route("/api/{*rest}", any(api_not_found))
            .fallback_service(frontend)
            .layer(middleware::from_fn_with_state(state.clone(), subscription_middleware))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
