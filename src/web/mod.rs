//! HTTP endpoint server for the Prometheus scrape target and dashboard.
//!
//! The server only ever reads the shared [`MetricsRegistry`] and
//! [`DashboardState`]; it never talks to the sampler directly, so requests
//! and sampling proceed independently.

pub mod config;
pub mod handlers;
pub mod html;
pub mod router;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::error::{PulseError, Result};
use crate::publish::{DashboardState, MetricsRegistry};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

/// State shared with every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: MetricsRegistry,
    pub dashboard: DashboardState,
    /// Dashboard meta-refresh period in seconds
    pub refresh_secs: u64,
}

impl AppState {
    pub fn new(registry: MetricsRegistry, dashboard: DashboardState, refresh_secs: u64) -> Self {
        Self {
            registry,
            dashboard,
            refresh_secs,
        }
    }
}

/// A bound, not yet serving, HTTP server.
pub struct WebServer {
    listener: TcpListener,
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    /// Bind the listening socket.
    ///
    /// Failing to bind is fatal for the caller and is not retried.
    pub async fn bind(config: &WebConfig, state: AppState) -> Result<Self> {
        config.validate()?;
        let bind_addr = config.bind_address();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| PulseError::bind_failed(&bind_addr, e))?;
        let addr = listener.local_addr()?;

        info!("GPU Pulse web server listening on http://{}", addr);
        info!("Dashboard available at http://{}/", addr);
        info!("Metrics endpoint: http://{}/metrics", addr);

        Ok(Self {
            listener,
            app: create_app(config, state),
            addr,
        })
    }

    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| PulseError::web_server_error(format!("Server error: {}", e)))
    }

    /// Serve on a background task.
    pub fn spawn(self) -> ServerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(self.serve(async move {
            let _ = shutdown_rx.await;
        }));

        ServerHandle {
            shutdown_tx: Some(shutdown_tx),
            join,
        }
    }
}

/// Handle to a server running on a background task.
pub struct ServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<()>>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for the server task to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let result = self
            .join
            .await
            .map_err(|e| PulseError::web_server_error(format!("Server task failed: {}", e)))?;
        info!("Web server stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(MetricsRegistry::new().unwrap(), DashboardState::new(), 1)
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port_and_shutdown() {
        let config = WebConfig::new("127.0.0.1", 0);
        let server = WebServer::bind(&config, state()).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);

        let handle = server.spawn();
        assert!(handle.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_blank_host_fails_before_binding() {
        let result = WebServer::bind(&WebConfig::new("", 0), state()).await;
        assert!(matches!(result, Err(PulseError::Config(_))));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = WebServer::bind(&WebConfig::new("127.0.0.1", 0), state())
            .await
            .unwrap();
        let taken = WebConfig::new("127.0.0.1", first.local_addr().port());

        let result = WebServer::bind(&taken, state()).await;
        assert!(matches!(result, Err(PulseError::EndpointBindFailed { .. })));
    }
}
