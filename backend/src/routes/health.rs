use std::sync::Arc;

use aide::axum::IntoApiResponse;
use axum::{http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;

use backend_storage::device_subscription::DeviceSubscriptionStorage;

/// Per-dependency health verdicts
#[derive(Debug, Serialize, JsonSchema)]
pub struct HealthChecks {
    /// Storage round-trip result
    database: &'static str,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct HealthResponse {
    status: &'static str,
    /// When the probe ran
    timestamp: DateTime<Utc>,
    checks: HealthChecks,
}

/// Health check endpoint
///
/// Probes the storage layer with a round trip and reports 200 when healthy,
/// 503 when any dependency is degraded. Used by load balancers and
/// deployment verification.
pub async fn handler(
    Extension(subscription_storage): Extension<Arc<DeviceSubscriptionStorage>>,
) -> impl IntoApiResponse {
    let database_healthy = match subscription_storage.health().await {
        Ok(()) => true,
        Err(err) => {
            tracing::error!("Health probe failed against storage: {err}");
            false
        }
    };

    let status = if database_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if database_healthy { "healthy" } else { "degraded" },
            timestamp: Utc::now(),
            checks: HealthChecks {
                database: if database_healthy { "ok" } else { "unreachable" },
            },
        }),
    )
}
