#![allow(dead_code)]

pub mod aws_setup;
mod test_router;

pub use test_router::*;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use sha2::Sha256;
use tower::ServiceExt;

use backend::middleware::auth::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use backend::types::Environment;

/// Produces the signature the service expects for one request
pub fn sign_request(method: &str, path: &str, body: &[u8], timestamp: &str) -> String {
    let secret = Environment::Development.hmac_secret();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body);
    mac.update(timestamp.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Send an unsigned request; only unauthenticated routes accept these
pub async fn send_unsigned_request(method: &str, route: &str, body: Option<String>) -> Response {
    let app = get_test_router().await;
    let mut builder = Request::builder().uri(route).method(method);
    if body.is_some() {
        builder = builder.header("Content-Type", "application/json");
    }

    app.oneshot(builder.body(body.map_or_else(Body::empty, Body::from)).unwrap())
        .await
        .unwrap()
}

/// Send a correctly signed request with a fresh timestamp
pub async fn send_signed_request(method: &str, route: &str, body: Option<String>) -> Response {
    let timestamp = Utc::now().to_rfc3339();
    send_signed_request_at(method, route, body, &timestamp).await
}

/// Send a request signed for an arbitrary timestamp
pub async fn send_signed_request_at(
    method: &str,
    route: &str,
    body: Option<String>,
    timestamp: &str,
) -> Response {
    let body_bytes = body.clone().unwrap_or_default();
    let signature = sign_request(method, route, body_bytes.as_bytes(), timestamp);

    let app = get_test_router().await;
    let mut builder = Request::builder()
        .uri(route)
        .method(method)
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature);
    if body.is_some() {
        builder = builder.header("Content-Type", "application/json");
    }

    app.oneshot(builder.body(body.map_or_else(Body::empty, Body::from)).unwrap())
        .await
        .unwrap()
}

/// Parse response body to JSON
pub async fn parse_response_body(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Setup test environment variables
pub fn setup_test_env() {
    // Initialize tracing for tests
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}
