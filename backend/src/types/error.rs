//! Universal error handling for the API

use aide::OperationOutput;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use schemars::JsonSchema;
use serde::Serialize;

use backend_storage::{
    delivery_attempt::DeliveryAttemptStorageError,
    device_subscription::DeviceSubscriptionStorageError,
    notification::NotificationStorageError,
    notification_recipient::NotificationRecipientStorageError,
};

/// API error response envelope
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    /// Whether the client should retry the request
    pub allow_retry: bool,
    /// Error details
    pub error: ErrorBody,
}

/// Error body containing code and message
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: &'static str,
    /// Human-readable error message
    pub message: &'static str,
}

/// Application error type that wraps the API error response
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    inner: ApiErrorResponse,
}

impl AppError {
    /// Create a new application error
    #[must_use]
    pub const fn new(
        status: StatusCode,
        code: &'static str,
        msg: &'static str,
        retry: bool,
    ) -> Self {
        Self {
            status,
            inner: ApiErrorResponse {
                allow_retry: retry,
                error: ErrorBody { code, message: msg },
            },
        }
    }

    /// Shorthand for an opaque internal error
    #[must_use]
    pub const fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
            true,
        )
    }

    /// Status code this error renders with
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error based on status code
        match self.status.as_u16() {
            400..=499 => tracing::warn!(
                "Client error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            500..=599 => tracing::error!(
                "Server error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            _ => {}
        }

        (self.status, Json(self.inner)).into_response()
    }
}

/// Convert device subscription storage errors to application errors
impl From<DeviceSubscriptionStorageError> for AppError {
    fn from(err: DeviceSubscriptionStorageError) -> Self {
        use DeviceSubscriptionStorageError::{SubscriptionExists, SubscriptionNotFound};

        match &err {
            SubscriptionNotFound => Self::new(
                StatusCode::NOT_FOUND,
                "subscription_not_found",
                "Device subscription not found",
                false,
            ),
            SubscriptionExists => Self::new(
                StatusCode::CONFLICT,
                "subscription_exists",
                "Device subscription already exists",
                false,
            ),
            _ => {
                tracing::error!("Subscription storage error: {err}");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage_unavailable",
                    "Storage temporarily unavailable",
                    true,
                )
            }
        }
    }
}

/// Convert notification storage errors to application errors
impl From<NotificationStorageError> for AppError {
    fn from(err: NotificationStorageError) -> Self {
        use NotificationStorageError::{
            IdempotencyKeyExists, NotificationExists, NotificationNotFound,
        };

        match &err {
            NotificationNotFound => Self::new(
                StatusCode::NOT_FOUND,
                "notification_not_found",
                "Notification not found",
                false,
            ),
            IdempotencyKeyExists | NotificationExists => Self::new(
                StatusCode::CONFLICT,
                "notification_exists",
                "Notification already exists",
                false,
            ),
            _ => {
                tracing::error!("Notification storage error: {err}");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage_unavailable",
                    "Storage temporarily unavailable",
                    true,
                )
            }
        }
    }
}

/// Convert recipient storage errors to application errors
impl From<NotificationRecipientStorageError> for AppError {
    fn from(err: NotificationRecipientStorageError) -> Self {
        tracing::error!("Recipient storage error: {err}");
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "storage_unavailable",
            "Storage temporarily unavailable",
            true,
        )
    }
}

/// Convert attempt storage errors to application errors
impl From<DeliveryAttemptStorageError> for AppError {
    fn from(err: DeliveryAttemptStorageError) -> Self {
        tracing::error!("Attempt storage error: {err}");
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "storage_unavailable",
            "Storage temporarily unavailable",
            true,
        )
    }
}

impl OperationOutput for AppError {
    type Inner = ApiErrorResponse;

    fn operation_response(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Option<aide::openapi::Response> {
        Json::<ApiErrorResponse>::operation_response(ctx, operation)
    }
}
