use axum::{response::IntoResponse, Extension};
use metrics_exporter_prometheus::PrometheusHandle;

/// Prometheus exposition endpoint
///
/// Renders the process-wide metrics registry installed at startup.
#[allow(clippy::unused_async)]
pub async fn handler(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
