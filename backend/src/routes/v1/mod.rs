mod notifications;
mod push_key;
mod subscriptions;

use aide::axum::{
    routing::{delete, get, post},
    ApiRouter,
};
use axum::middleware::from_fn;

use crate::middleware::require_signature;

/// Creates the v1 API router with all v1 handler routes
///
/// Everything except the VAPID public key requires a signed producer
/// request.
pub fn handler() -> ApiRouter {
    let protected = ApiRouter::new()
        .api_route("/subscriptions", post(subscriptions::register))
        .api_route("/subscriptions/{id}", delete(subscriptions::unregister))
        .api_route("/notifications", post(notifications::send))
        .api_route("/notifications/{id}", get(notifications::get))
        .api_route(
            "/notifications/{id}/attempts",
            get(notifications::list_attempts),
        )
        .layer(from_fn(require_signature));

    ApiRouter::new()
        .api_route("/push/public-key", get(push_key::public_key))
        .merge(protected)
}
