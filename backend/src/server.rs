use std::sync::Arc;
use std::time::Duration;

use aide::openapi::OpenApi;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use backend_storage::{
    delivery_attempt::DeliveryAttemptStorage, device_subscription::DeviceSubscriptionStorage,
    notification::NotificationStorage, notification_recipient::NotificationRecipientStorage,
    queue::DeliveryQueues,
};

use crate::routes;
use crate::types::Environment;

/// Storage and queue handles shared by every request handler
pub struct Dependencies {
    /// Device subscription storage
    pub subscriptions: Arc<DeviceSubscriptionStorage>,
    /// Notification storage
    pub notifications: Arc<NotificationStorage>,
    /// Notification recipient storage
    pub recipients: Arc<NotificationRecipientStorage>,
    /// Delivery attempt storage
    pub attempts: Arc<DeliveryAttemptStorage>,
    /// Delivery task queues
    pub queues: Arc<DeliveryQueues>,
}

/// Builds the full application router with all layers applied
pub fn router(
    environment: Environment,
    dependencies: Dependencies,
    metrics_handle: PrometheusHandle,
) -> axum::Router {
    let mut openapi = OpenApi::default();

    routes::handler()
        .finish_api(&mut openapi)
        .layer(Extension(openapi))
        .layer(Extension(environment))
        .layer(Extension(dependencies.subscriptions))
        .layer(Extension(dependencies.notifications))
        .layer(Extension(dependencies.recipients))
        .layer(Extension(dependencies.attempts))
        .layer(Extension(dependencies.queues))
        .layer(Extension(metrics_handle))
        .layer(cors_layer(environment))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(tower_http::timeout::TimeoutLayer::new(
            Duration::from_secs(30),
        ))
}

/// Starts the server with the given environment and dependencies
///
/// # Errors
///
/// Returns an error if the server fails to start or bind to the port
pub async fn start(
    environment: Environment,
    dependencies: Dependencies,
    metrics_handle: PrometheusHandle,
) -> anyhow::Result<()> {
    let router = router(environment, dependencies, metrics_handle);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], environment.port()));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Push notification API started on http://{addr}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}

/// Resolves when the process receives SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}

fn cors_layer(environment: Environment) -> CorsLayer {
    let origins: Vec<HeaderValue> = environment
        .cors_allowed_origins()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        // No allowlist configured: emit no CORS headers at all
        CorsLayer::new()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Recovered-panic handler: opaque 500 plus an error metric
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    let detail = err.downcast_ref::<&str>().map_or_else(
        || {
            err.downcast_ref::<String>()
                .map_or("unknown panic", String::as_str)
        },
        |s| *s,
    );
    tracing::error!("Recovered panic in HTTP handler: {detail}");
    metrics::counter!("http_panics_total").increment(1);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "allowRetry": true,
            "error": { "code": "internal_error", "message": "Internal server error" }
        })),
    )
        .into_response()
}
