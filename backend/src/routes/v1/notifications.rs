use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    Extension, Json,
};
use axum_valid::Valid;
use chrono::Utc;
use futures::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::AppError;
use backend_storage::{
    delivery_attempt::{DeliveryAttempt, DeliveryAttemptStorage},
    device_subscription::DeviceSubscriptionStorage,
    notification::{
        Notification, NotificationPriority, NotificationStatus, NotificationStorage,
        NotificationStorageError,
    },
    notification_recipient::NotificationRecipientStorage,
    queue::{DeliveryQueues, DeliveryTask},
};

/// Push vendors cap message TTL at four weeks
const MAX_TTL_SECONDS: u32 = 2_419_200;

#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct SendNotificationRequest {
    /// Short producer-defined tag
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50))]
    pub notification_type: String,
    /// Users to fan out to
    #[validate(length(min = 1, max = 1000), custom(function = "validate_user_ids"))]
    pub user_ids: Vec<String>,
    /// Token guaranteeing at-most-one admission of this request
    #[validate(length(min = 1, max = 255))]
    pub idempotency_key: Option<String>,
    /// Display title
    #[validate(length(max = 255))]
    pub title: Option<String>,
    /// Display body
    #[validate(length(max = 1000))]
    pub body: Option<String>,
    /// Icon URL
    #[validate(length(max = 500))]
    pub icon: Option<String>,
    /// Click-through URL
    #[validate(length(max = 500))]
    pub url: Option<String>,
    /// BCP-47 locale tag
    #[validate(length(max = 10))]
    pub locale: Option<String>,
    /// Opaque payload forwarded to the subscriber; must be a JSON object
    #[validate(custom(function = "validate_data_object"))]
    pub data: Option<serde_json::Value>,
    /// Grouping token persisted for near-duplicate analysis
    #[validate(length(max = 255))]
    pub dedupe_key: Option<String>,
    /// Push TTL in seconds
    #[validate(range(max = 2_419_200))]
    pub ttl_seconds: Option<u32>,
    /// Queue tier selector; defaults to `normal`
    pub priority: Option<NotificationPriority>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SendNotificationResponse {
    /// Admitted notification id
    pub id: String,
    /// Lifecycle status at admission
    pub status: NotificationStatus,
    /// Number of distinct recipients persisted
    pub recipient_count: usize,
}

fn validate_user_ids(user_ids: &[String]) -> Result<(), validator::ValidationError> {
    if user_ids
        .iter()
        .all(|user_id| !user_id.is_empty() && user_id.len() <= 255)
    {
        return Ok(());
    }

    let mut error = validator::ValidationError::new("invalid_user_id");
    error.message = Some(std::borrow::Cow::Borrowed(
        "user_ids entries must be 1-255 characters",
    ));
    Err(error)
}

fn validate_data_object(data: &serde_json::Value) -> Result<(), validator::ValidationError> {
    if data.is_object() {
        return Ok(());
    }

    let mut error = validator::ValidationError::new("invalid_data");
    error.message = Some(std::borrow::Cow::Borrowed("data must be a JSON object"));
    Err(error)
}

/// Admit a notification and fan it out to every active subscription
///
/// The guarded notification put (idempotency guard + row in one
/// transaction) is the single transactional boundary; recipients are
/// bulk-written only after it commits, so a losing concurrent admission
/// never writes a row. Replaying an `idempotency_key` returns the original
/// notification with `200 OK` and enqueues nothing.
///
/// Enqueueing happens after the commit and is best effort per
/// (recipient, subscription): a failed enqueue is logged and never fails the
/// request, since the notification is already durable.
///
/// # Errors
///
/// Returns an error if:
/// - `400 BAD_REQUEST` - Validation failure on any documented bound
/// - `401 UNAUTHORIZED` - Missing or invalid request signature
/// - `503 SERVICE_UNAVAILABLE` - Storage connectivity issues
pub async fn send(
    Extension(notification_storage): Extension<Arc<NotificationStorage>>,
    Extension(recipient_storage): Extension<Arc<NotificationRecipientStorage>>,
    Extension(subscription_storage): Extension<Arc<DeviceSubscriptionStorage>>,
    Extension(delivery_queues): Extension<Arc<DeliveryQueues>>,
    Valid(Json(payload)): Valid<Json<SendNotificationRequest>>,
) -> Result<(StatusCode, Json<SendNotificationResponse>), AppError> {
    if let Some(key) = &payload.idempotency_key {
        if let Some(existing) = notification_storage.get_by_idempotency_key(key).await? {
            let replay = replay_response(&recipient_storage, existing).await?;
            return Ok((StatusCode::OK, Json(replay)));
        }
    }

    let mut user_ids = payload.user_ids;
    user_ids.sort_unstable();
    user_ids.dedup();

    let now = Utc::now();
    let notification = Notification {
        id: Uuid::new_v4().to_string(),
        idempotency_key: payload.idempotency_key,
        notification_type: payload.notification_type,
        title: payload.title,
        body: payload.body,
        icon: payload.icon,
        url: payload.url,
        locale: payload.locale,
        data: payload
            .data
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
        status: NotificationStatus::Pending,
        dedupe_key: payload.dedupe_key,
        ttl_seconds: payload.ttl_seconds.map(|ttl| ttl.min(MAX_TTL_SECONDS)),
        priority: payload.priority.unwrap_or_default(),
        created_at: now,
    };

    // The loser of a concurrent admission race replays the winner here
    // without having written a single recipient row.
    match notification_storage.create(&notification).await {
        Ok(()) => {}
        Err(NotificationStorageError::IdempotencyKeyExists) => {
            // A concurrent producer won the key; replay its notification
            let key = notification.idempotency_key.as_deref().unwrap_or_default();
            let existing = notification_storage
                .get_by_idempotency_key(key)
                .await?
                .ok_or_else(AppError::internal)?;
            let replay = replay_response(&recipient_storage, existing).await?;
            return Ok((StatusCode::OK, Json(replay)));
        }
        Err(err) => return Err(err.into()),
    }

    recipient_storage
        .insert_many(&notification.id, &user_ids, now)
        .await?;

    let enqueued =
        enqueue_delivery_tasks(&subscription_storage, &delivery_queues, &notification, &user_ids)
            .await;

    metrics::counter!("notifications_admitted_total").increment(1);
    tracing::info!(
        notification_id = %notification.id,
        recipients = user_ids.len(),
        enqueued,
        priority = %notification.priority,
        "Notification admitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SendNotificationResponse {
            id: notification.id,
            status: notification.status,
            recipient_count: user_ids.len(),
        }),
    ))
}

async fn replay_response(
    recipient_storage: &NotificationRecipientStorage,
    existing: Notification,
) -> Result<SendNotificationResponse, AppError> {
    let recipient_count = recipient_storage
        .list_by_notification(&existing.id)
        .await?
        .len();

    Ok(SendNotificationResponse {
        id: existing.id,
        status: existing.status,
        recipient_count,
    })
}

/// Enqueues one delivery task per (recipient, active subscription)
///
/// Returns the number of tasks actually enqueued. Failures are logged and
/// swallowed; an unreachable broker degrades to an un-enqueued recipient a
/// later sweep can reconcile.
async fn enqueue_delivery_tasks(
    subscription_storage: &DeviceSubscriptionStorage,
    delivery_queues: &DeliveryQueues,
    notification: &Notification,
    user_ids: &[String],
) -> usize {
    let queue = delivery_queues.for_priority(notification.priority);
    let mut enqueued = 0;

    for user_id in user_ids {
        let subscriptions = match subscription_storage.list_active_by_user(user_id).await {
            Ok(subscriptions) => subscriptions,
            Err(err) => {
                tracing::error!(
                    notification_id = %notification.id,
                    user_id,
                    "Failed to load subscriptions for fan-out: {err}"
                );
                continue;
            }
        };

        let tasks: Vec<DeliveryTask> = subscriptions
            .iter()
            .map(|subscription| DeliveryTask {
                notification_id: notification.id.clone(),
                user_id: user_id.clone(),
                subscription_id: subscription.id.clone(),
            })
            .collect();

        let sends = tasks.iter().map(|task| queue.send_message(task));
        for (task, result) in tasks.iter().zip(join_all(sends).await) {
            match result {
                Ok(_) => enqueued += 1,
                Err(err) => {
                    tracing::error!(
                        notification_id = %task.notification_id,
                        subscription_id = %task.subscription_id,
                        "Failed to enqueue delivery task: {err}"
                    );
                }
            }
        }
    }

    metrics::counter!("delivery_tasks_enqueued_total").increment(enqueued as u64);
    enqueued
}

/// Fetch one notification by id
///
/// # Errors
///
/// Returns `404 NOT_FOUND` for unknown ids, `401 UNAUTHORIZED` on signature
/// failure, `503 SERVICE_UNAVAILABLE` on storage issues
pub async fn get(
    Extension(notification_storage): Extension<Arc<NotificationStorage>>,
    Path(id): Path<String>,
) -> Result<Json<Notification>, AppError> {
    notification_storage
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::new(
                StatusCode::NOT_FOUND,
                "notification_not_found",
                "Notification not found",
                false,
            )
        })
}

/// List the delivery attempts of a notification, newest first
///
/// An empty array is a valid response: admission may not have fanned out
/// yet, or the notification id may be unknown.
///
/// # Errors
///
/// Returns `401 UNAUTHORIZED` on signature failure,
/// `503 SERVICE_UNAVAILABLE` on storage issues
pub async fn list_attempts(
    Extension(attempt_storage): Extension<Arc<DeliveryAttemptStorage>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<DeliveryAttempt>>, AppError> {
    Ok(Json(attempt_storage.list_by_notification(&id).await?))
}
