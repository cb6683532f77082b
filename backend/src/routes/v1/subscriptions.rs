use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    Extension, Json,
};
use axum_valid::Valid;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::AppError;
use backend_storage::device_subscription::{
    DeviceSubscription, DeviceSubscriptionStorage, DeviceSubscriptionStorageError,
};

#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionKeys {
    /// Base64url P-256 ECDH public key from the browser subscription
    #[validate(length(min = 1, max = 255))]
    pub p256dh: String,
    /// Base64url authentication secret from the browser subscription
    #[validate(length(min = 1, max = 255))]
    pub auth: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterSubscriptionRequest {
    /// Opaque external user id
    #[validate(length(min = 1, max = 255))]
    pub user_id: String,
    /// Vendor push endpoint; must be an absolute HTTPS URL
    #[validate(length(min = 1, max = 500), custom(function = "validate_endpoint"))]
    pub endpoint: String,
    /// Browser-provided key material
    #[validate(nested)]
    pub keys: SubscriptionKeys,
    /// Optional client-assigned device id
    #[validate(length(max = 255))]
    pub device_id: Option<String>,
    /// User agent string of the subscribing browser
    #[validate(length(max = 500))]
    pub user_agent: Option<String>,
    /// BCP-47 locale tag
    #[validate(length(max = 10))]
    pub locale: Option<String>,
    /// IANA timezone name
    #[validate(length(max = 50))]
    pub timezone: Option<String>,
}

// Push endpoints are vendor HTTPS URLs; nothing else is contactable
fn validate_endpoint(endpoint: &str) -> Result<(), validator::ValidationError> {
    if endpoint.starts_with("https://") {
        return Ok(());
    }

    let mut error = validator::ValidationError::new("invalid_endpoint");
    error.message = Some(std::borrow::Cow::Borrowed(
        "endpoint must be an absolute https:// URL",
    ));
    Err(error)
}

/// Register a browser push subscription
///
/// The endpoint URL is the unit of identity. Registering a new endpoint
/// creates an active subscription and returns `201 CREATED`; registering a
/// known endpoint returns the existing record unchanged with `200 OK`, even
/// when the caller presents a different `user_id` or key material.
///
/// # Errors
///
/// Returns an error if:
/// - `400 BAD_REQUEST` - Validation failure on any documented bound
/// - `401 UNAUTHORIZED` - Missing or invalid request signature
/// - `503 SERVICE_UNAVAILABLE` - Storage connectivity issues
pub async fn register(
    Extension(subscription_storage): Extension<Arc<DeviceSubscriptionStorage>>,
    Valid(Json(payload)): Valid<Json<RegisterSubscriptionRequest>>,
) -> Result<(StatusCode, Json<DeviceSubscription>), AppError> {
    if let Some(existing) = subscription_storage
        .get_by_endpoint(&payload.endpoint)
        .await?
    {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let now = Utc::now();
    let subscription = DeviceSubscription {
        id: Uuid::new_v4().to_string(),
        user_id: payload.user_id,
        endpoint: payload.endpoint,
        p256dh: payload.keys.p256dh,
        auth: payload.keys.auth,
        device_id: payload.device_id,
        user_agent: payload.user_agent,
        locale: payload.locale,
        timezone: payload.timezone,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    match subscription_storage.insert(&subscription).await {
        Ok(()) => Ok((StatusCode::CREATED, Json(subscription))),
        Err(DeviceSubscriptionStorageError::SubscriptionExists) => {
            // Lost a registration race on the same endpoint; return the winner
            let existing = subscription_storage
                .get_by_endpoint(&subscription.endpoint)
                .await?
                .ok_or_else(AppError::internal)?;
            Ok((StatusCode::OK, Json(existing)))
        }
        Err(err) => Err(err.into()),
    }
}

/// Unregister a subscription by id (soft delete)
///
/// Flips `is_active` off; the row is retained for the attempt ledger.
///
/// # Errors
///
/// Returns an error if:
/// - `404 NOT_FOUND` - Unknown subscription id
/// - `401 UNAUTHORIZED` - Missing or invalid request signature
/// - `503 SERVICE_UNAVAILABLE` - Storage connectivity issues
pub async fn unregister(
    Extension(subscription_storage): Extension<Arc<DeviceSubscriptionStorage>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let subscription = subscription_storage
        .get_by_id(&id)
        .await?
        .ok_or_else(|| {
            AppError::new(
                StatusCode::NOT_FOUND,
                "subscription_not_found",
                "Device subscription not found",
                false,
            )
        })?;

    subscription_storage.deactivate(&subscription.endpoint).await?;

    Ok(StatusCode::NO_CONTENT)
}
