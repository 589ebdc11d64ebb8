//! HTTP exposition of [`EngineMetrics`] at `GET /metrics`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::metrics::EngineMetrics;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

async fn metrics_handler(State(metrics): State<Arc<EngineMetrics>>) -> Response {
    match metrics.encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub fn router(metrics: Arc<EngineMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

/// Serve `/metrics` on `listener` until `shutdown` fires.
pub fn spawn_metrics_server(
    listener: TcpListener,
    metrics: Arc<EngineMetrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "metrics endpoint listening");
        }
        let served = axum::serve(listener, router(metrics))
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await;
        match served {
            Ok(()) => tracing::info!("metrics endpoint stopped"),
            Err(e) => tracing::error!(error = %e, "metrics endpoint failed"),
        }
    })
}
