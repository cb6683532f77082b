//! Worker health and metrics listener

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::StatusCode, response::IntoResponse, routing::get, Extension, Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use backend_storage::device_subscription::DeviceSubscriptionStorage;

use crate::worker::WorkerResult;

/// Health check endpoint
///
/// Probes storage with a round trip; 503 when the probe fails, since a
/// worker that cannot reach its tables can only spin.
async fn health(
    Extension(subscriptions): Extension<Arc<DeviceSubscriptionStorage>>,
) -> impl IntoResponse {
    match subscriptions.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "notification-worker",
            })),
        ),
        Err(err) => {
            tracing::error!("Worker health probe failed: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "service": "notification-worker",
                })),
            )
        }
    }
}

#[allow(clippy::unused_async)]
async fn metrics(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

/// Start the health check HTTP server
///
/// # Errors
///
/// Returns an error if the server fails to bind to the specified address
pub async fn start_health_server(
    port: u16,
    subscriptions: Arc<DeviceSubscriptionStorage>,
    metrics_handle: PrometheusHandle,
    shutdown_token: CancellationToken,
) -> WorkerResult<()> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(Extension(subscriptions))
        .layer(Extension(metrics_handle));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Health check server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
        })
        .await?;

    Ok(())
}
