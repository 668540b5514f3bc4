//! Startup orchestration.
//!
//! # Responsibilities
//! - Prepare the data directory and active configuration
//! - Start the daemon, then the HTTP server
//! - Stop the daemon after the server has drained
//!
//! # Design Decisions
//! - Fail fast on storage and bind errors
//! - A daemon that fails to launch is logged, not fatal: the API stays up
//!   so settings can be corrected

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ManagerConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_signal;
use crate::manager::Manager;
use crate::observability::metrics;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the manager until a shutdown signal arrives.
pub async fn run(config: ManagerConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let manager = Arc::new(Manager::from_config(&config));
    manager.prepare().await?;
    manager.start_daemon().await;

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, manager.clone());
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let joined = tokio::select! {
        _ = shutdown_signal() => {
            shutdown.trigger();
            (&mut server_task).await
        }
        joined = &mut server_task => joined,
    };

    let served = joined.unwrap_or_else(|e| Err(std::io::Error::other(e)));
    manager.shutdown().await;
    served?;
    Ok(())
}
