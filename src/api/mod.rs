//! HTTP event ingress
//!
//! Lets other processes feed speech events, trigger a manual wake and read
//! the gate state. Every request goes through the same ordered event channel
//! as stdin, so HTTP never touches the gate directly.

mod events;
mod health;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::daemon::EventSender;
use crate::gate::GateSnapshot;

/// Shared state for API handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    /// Ordered channel into the event loop
    pub events: EventSender,

    /// Latest gate snapshot
    pub snapshots: watch::Receiver<GateSnapshot>,
}

/// Build the router with all routes
#[must_use]
pub fn router(state: ApiState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/v1", events::router(state))
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: ApiState,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: ApiState, port: u16) -> Self {
        Self { state, port }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let result = self.run().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "API server stopped");
            }
            result
        })
    }
}
