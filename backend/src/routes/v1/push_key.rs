use axum::{http::StatusCode, Extension, Json};
use schemars::JsonSchema;
use serde::Serialize;

use crate::types::{AppError, Environment};

#[derive(Debug, Serialize, JsonSchema)]
pub struct PublicKeyResponse {
    /// Base64url VAPID public key browsers subscribe with
    pub public_key: String,
}

/// Serves the VAPID public key to subscribing clients
///
/// # Errors
///
/// Returns `503 SERVICE_UNAVAILABLE` when no key is configured
#[allow(clippy::unused_async)]
pub async fn public_key(
    Extension(environment): Extension<Environment>,
) -> Result<Json<PublicKeyResponse>, AppError> {
    environment
        .vapid_public_key()
        .map(|public_key| Json(PublicKeyResponse { public_key }))
        .ok_or_else(|| {
            AppError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "vapid_key_unset",
                "Push public key is not configured",
                true,
            )
        })
}
