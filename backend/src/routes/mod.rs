mod docs;
mod health;
mod metrics;
pub mod v1;

use aide::axum::{routing::get, ApiRouter};

/// Creates the router with all handler routes
pub fn handler() -> ApiRouter {
    ApiRouter::new()
        .merge(docs::handler())
        .api_route("/healthz", get(health::handler))
        .route("/metrics", axum::routing::get(metrics::handler))
        .nest("/v1", v1::handler())
}
