//! Producer request authentication
//!
//! Every protected call carries an `X-Timestamp` (RFC3339) and an
//! `X-Signature` header: base64 of HMAC-SHA256 over
//! `METHOD || PATH || BODY || TIMESTAMP` under the shared producer secret.
//! Verification is constant time and tolerates at most five minutes of
//! clock skew. Any failure is a generic 401 with no detail leaked.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
    Extension,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::{AppError, Environment};

/// Header carrying the RFC3339 request timestamp
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Header carrying the base64 request signature
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Maximum clock skew accepted between producer and service
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 5 * 60;

/// Signed bodies above this size are rejected before verification
const MAX_SIGNED_BODY_BYTES: usize = 1024 * 1024;

type HmacSha256 = Hmac<Sha256>;

fn unauthorized() -> AppError {
    AppError::new(
        StatusCode::UNAUTHORIZED,
        "invalid_signature",
        "Missing or invalid request signature",
        false,
    )
}

/// Verifies one producer signature in constant time
///
/// # Errors
///
/// Returns a generic 401 `AppError` when the timestamp is unparseable or
/// outside the skew window, the signature is not valid base64, or the MAC
/// does not match
pub fn verify_signature(
    secret: &str,
    method: &str,
    path: &str,
    body: &[u8],
    timestamp: &str,
    signature_b64: &str,
) -> Result<(), AppError> {
    let parsed = DateTime::parse_from_rfc3339(timestamp).map_err(|_| unauthorized())?;
    let skew = (Utc::now() - parsed.with_timezone(&Utc)).num_seconds().abs();
    if skew > MAX_CLOCK_SKEW_SECONDS {
        return Err(unauthorized());
    }

    let signature = STANDARD.decode(signature_b64).map_err(|_| unauthorized())?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::internal())?;
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body);
    mac.update(timestamp.as_bytes());

    // verify_slice is constant time
    mac.verify_slice(&signature).map_err(|_| unauthorized())
}

/// Request-signing middleware for the protected producer routes
///
/// Buffers the body to verify the signature, then reinstates it for the
/// downstream extractors.
///
/// # Errors
///
/// Returns a 401 `AppError` on missing or invalid signature material, or a
/// 400 when the body exceeds the signable size cap
pub async fn require_signature(
    Extension(environment): Extension<Environment>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let secret = environment.hmac_secret();

    let (parts, body) = request.into_parts();

    let timestamp = parts
        .headers
        .get(TIMESTAMP_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(unauthorized)?
        .to_string();

    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(unauthorized)?
        .to_string();

    let body_bytes = to_bytes(body, MAX_SIGNED_BODY_BYTES).await.map_err(|_| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            "payload_too_large",
            "Request body exceeds the signable size limit",
            false,
        )
    })?;

    verify_signature(
        &secret,
        parts.method.as_str(),
        parts.uri.path(),
        &body_bytes,
        &timestamp,
        &signature,
    )?;

    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(request).await)
}
