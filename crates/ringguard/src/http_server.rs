//! HTTP server for the Prometheus metrics endpoint.

use crate::metrics::MetricsRegistry;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use common::Result;
use prometheus_client::encoding::text::encode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// HTTP server for metrics endpoint
pub struct MetricsServer {
    registry: Arc<MetricsRegistry>,
    listen_addr: String,
}

impl MetricsServer {
    pub fn new(registry: Arc<MetricsRegistry>, listen_addr: String) -> Self {
        Self {
            registry,
            listen_addr,
        }
    }

    fn router(registry: Arc<MetricsRegistry>) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(registry)
    }

    /// Run the HTTP server until the listener fails
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(listen_addr = %self.listen_addr, "Metrics server listening");

        axum::serve(listener, Self::router(self.registry)).await?;
        Ok(())
    }
}

/// Handler for /metrics endpoint
async fn metrics_handler(State(registry): State<Arc<MetricsRegistry>>) -> Response {
    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &registry.registry) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}
