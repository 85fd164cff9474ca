//! HTTP server for the metrics, raw-state and liveness endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::collector::MetricCollector;
use crate::record::TelemetryRecord;
use crate::store::SharedStore;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    collector: Arc<MetricCollector>,
    store: SharedStore,
}

/// Create the HTTP router.
pub fn create_router(
    collector: Arc<MetricCollector>,
    store: SharedStore,
    metrics_path: &str,
) -> Router {
    let state = AppState { collector, store };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/api/v1/lixee", get(raw_state_handler))
        .route("/-/healthy", get(healthy_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let body = state.collector.render();

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Handler for the raw-state endpoint: the last-known reading,
/// re-serialized with the inbound wire field names.
async fn raw_state_handler(State(state): State<AppState>) -> Json<TelemetryRecord> {
    Json(state.store.snapshot())
}

/// Handler for the liveness endpoint. Asserts process liveness only,
/// not meter connectivity.
async fn healthy_handler() -> Response {
    (StatusCode::OK, "Healthy").into_response()
}

/// HTTP server configuration.
pub struct HttpServer {
    collector: Arc<MetricCollector>,
    store: SharedStore,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(
        collector: Arc<MetricCollector>,
        store: SharedStore,
        listen_addr: SocketAddr,
        metrics_path: String,
    ) -> Self {
        Self {
            collector,
            store,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.collector, self.store, &self.metrics_path);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
