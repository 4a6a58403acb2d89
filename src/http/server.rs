//! HTTP server.
//!
//! # Responsibilities
//! - Serve the assembled router on a Tokio listener
//! - On shutdown, close websocket subscribers before the listener stops
//!
//! # Design Decisions
//! - The multiplexer shutdown runs inside the graceful-shutdown future, so
//!   `closing` is set and clients receive `1001` before accepting ends

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::http::websocket::SubscriptionMultiplexer;

/// HTTP server for the GraphQL application.
pub struct HttpServer {
    router: Router,
    multiplexer: Option<Arc<SubscriptionMultiplexer>>,
}

impl HttpServer {
    pub fn new(router: Router, multiplexer: Option<Arc<SubscriptionMultiplexer>>) -> Self {
        Self { router, multiplexer }
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let multiplexer = self.multiplexer;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                if let Some(multiplexer) = multiplexer {
                    multiplexer.shutdown();
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
