//! Notification storage integration using Dynamo DB
//!
//! A notification is one logical send request from a producer. Idempotency
//! keys are made unique with a guard item written in the same
//! `TransactWriteItems` as the notification row, conditional on neither
//! existing; the guard's partition key is `idempotency#<key>` so both item
//! kinds share the table.

mod error;

use std::sync::Arc;

use aws_sdk_dynamodb::{
    error::SdkError,
    types::{AttributeValue, Put, Select, TransactWriteItem},
    Client as DynamoDbClient,
};
use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use error::{NotificationStorageError, NotificationStorageResult};
use strum::Display;

/// Name of the GSI keyed by dedupe key with `created_at` as sort key
pub const DEDUPE_INDEX: &str = "dedupe-index";

/// Prefix distinguishing idempotency guard items from notification rows
const IDEMPOTENCY_GUARD_PREFIX: &str = "idempotency#";

/// Attribute names for the notification table
#[derive(Debug, Clone, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationAttribute {
    /// Notification id (Primary Key); guard items use `idempotency#<key>`
    Id,
    /// Delivery lifecycle status
    Status,
    /// Producer-supplied grouping token (`dedupe-index` GSI key)
    DedupeKey,
    /// Creation timestamp (`dedupe-index` GSI sort key)
    CreatedAt,
}

/// Delivery lifecycle of a notification
///
/// Transitions are monotonic within pending → sending → (partial | sent |
/// failed); nothing advances past `pending` unless an aggregation sweep runs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationStatus {
    /// Admitted, fan-out not yet observed
    #[default]
    Pending,
    /// Delivery in progress
    Sending,
    /// Some subscriptions delivered, some terminally failed
    Partial,
    /// All subscriptions delivered
    Sent,
    /// No subscription delivered
    Failed,
}

/// Producer-assigned urgency of a notification
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationPriority {
    /// Deliverable whenever convenient
    Low,
    /// Default priority
    #[default]
    Normal,
    /// Time-sensitive
    High,
    /// Must reach the device as soon as possible
    Critical,
}

/// One logical send request
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Notification {
    /// Notification id
    pub id: String,
    /// Producer-supplied token guaranteeing at-most-one admission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Short producer-defined tag
    #[serde(rename = "type")]
    pub notification_type: String,
    /// Display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Display body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Icon URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Click-through URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// BCP-47 locale tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Opaque producer payload, always a JSON object
    pub data: serde_json::Value,
    /// Delivery lifecycle status
    pub status: NotificationStatus,
    /// Producer-supplied grouping token, persisted but not consulted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
    /// Push TTL in seconds forwarded to the vendor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u32>,
    /// Producer-assigned urgency
    pub priority: NotificationPriority,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Guard item reserving an idempotency key for a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdempotencyKeyGuard {
    /// `idempotency#<key>` partition key
    id: String,
    /// Notification the key is reserved for
    notification_id: String,
    /// Creation timestamp
    created_at: DateTime<Utc>,
}

/// Notification storage client for Dynamo DB operations
#[derive(Clone)]
pub struct NotificationStorage {
    dynamodb_client: Arc<DynamoDbClient>,
    table_name: String,
}

impl NotificationStorage {
    /// Creates a new notification storage client
    ///
    /// # Arguments
    ///
    /// * `dynamodb_client` - Pre-configured Dynamo DB client
    /// * `table_name` - Dynamo DB table name for notifications
    #[must_use]
    pub const fn new(dynamodb_client: Arc<DynamoDbClient>, table_name: String) -> Self {
        Self {
            dynamodb_client,
            table_name,
        }
    }

    fn guard_id(idempotency_key: &str) -> String {
        format!("{IDEMPOTENCY_GUARD_PREFIX}{idempotency_key}")
    }

    /// Creates a notification row, reserving its idempotency key when present
    ///
    /// With an idempotency key the notification row and the guard item are
    /// written in one transaction, each conditional on not existing; without
    /// one, a single conditional put suffices.
    ///
    /// # Errors
    ///
    /// Returns `NotificationStorageError::IdempotencyKeyExists` when the key
    /// is already reserved, `NotificationStorageError::NotificationExists`
    /// when the id collides, or another `NotificationStorageError` if the
    /// Dynamo DB operation fails
    pub async fn create(&self, notification: &Notification) -> NotificationStorageResult<()> {
        let item = serde_dynamo::to_item(notification)
            .map_err(|e| NotificationStorageError::SerializationError(e.to_string()))?;

        let Some(key) = &notification.idempotency_key else {
            return self.put_unguarded(item).await;
        };

        let guard = IdempotencyKeyGuard {
            id: Self::guard_id(key),
            notification_id: notification.id.clone(),
            created_at: notification.created_at,
        };
        let guard_item = serde_dynamo::to_item(&guard)
            .map_err(|e| NotificationStorageError::SerializationError(e.to_string()))?;

        let guard_put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(guard_item))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", NotificationAttribute::Id.to_string())
            .build()
            .map_err(|e| NotificationStorageError::TransactBuildError(e.to_string()))?;

        let notification_put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", NotificationAttribute::Id.to_string())
            .build()
            .map_err(|e| NotificationStorageError::TransactBuildError(e.to_string()))?;

        self.dynamodb_client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(guard_put).build())
            .transact_items(TransactWriteItem::builder().put(notification_put).build())
            .send()
            .await
            .map_err(|err| {
                if matches!(
                    err,
                    SdkError::ServiceError(ref svc) if svc.err().is_transaction_canceled_exception()
                ) {
                    NotificationStorageError::IdempotencyKeyExists
                } else {
                    err.into()
                }
            })?;

        Ok(())
    }

    async fn put_unguarded(
        &self,
        item: std::collections::HashMap<String, AttributeValue>,
    ) -> NotificationStorageResult<()> {
        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", NotificationAttribute::Id.to_string())
            .send()
            .await
            .map_err(|err| {
                if matches!(
                    err,
                    SdkError::ServiceError(ref svc) if svc.err().is_conditional_check_failed_exception()
                ) {
                    NotificationStorageError::NotificationExists
                } else {
                    err.into()
                }
            })?;

        Ok(())
    }

    /// Gets a notification by id
    ///
    /// # Errors
    ///
    /// Returns `NotificationStorageError` if the Dynamo DB operation fails
    pub async fn get_by_id(
        &self,
        id: &str,
    ) -> NotificationStorageResult<Option<Notification>> {
        let response = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .key(
                NotificationAttribute::Id.to_string(),
                AttributeValue::S(id.to_string()),
            )
            .send()
            .await?;

        response
            .item()
            .map(|item| {
                serde_dynamo::from_item(item.clone())
                    .map_err(|e| NotificationStorageError::ParseNotificationError(e.to_string()))
            })
            .transpose()
    }

    /// Resolves an idempotency key to the notification it is reserved for
    ///
    /// # Errors
    ///
    /// Returns `NotificationStorageError` if the Dynamo DB operation fails
    pub async fn get_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> NotificationStorageResult<Option<Notification>> {
        let response = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .key(
                NotificationAttribute::Id.to_string(),
                AttributeValue::S(Self::guard_id(idempotency_key)),
            )
            .send()
            .await?;

        let Some(item) = response.item() else {
            return Ok(None);
        };

        let guard: IdempotencyKeyGuard = serde_dynamo::from_item(item.clone())
            .map_err(|e| NotificationStorageError::ParseNotificationError(e.to_string()))?;

        self.get_by_id(&guard.notification_id).await
    }

    /// Finds notifications sharing a dedupe key created after `since`
    ///
    /// # Errors
    ///
    /// Returns `NotificationStorageError` if the Dynamo DB operation fails
    pub async fn find_by_dedupe_key(
        &self,
        dedupe_key: &str,
        since: DateTime<Utc>,
    ) -> NotificationStorageResult<Vec<Notification>> {
        let response = self
            .dynamodb_client
            .query()
            .table_name(&self.table_name)
            .index_name(DEDUPE_INDEX)
            .key_condition_expression("#dedupe_key = :key AND #created_at > :since")
            .expression_attribute_names(
                "#dedupe_key",
                NotificationAttribute::DedupeKey.to_string(),
            )
            .expression_attribute_names(
                "#created_at",
                NotificationAttribute::CreatedAt.to_string(),
            )
            .expression_attribute_values(":key", AttributeValue::S(dedupe_key.to_string()))
            .expression_attribute_values(
                ":since",
                AttributeValue::S(since.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            )
            .select(Select::AllAttributes)
            .send()
            .await?;

        response
            .items()
            .iter()
            .map(|item| {
                serde_dynamo::from_item(item.clone())
                    .map_err(|e| NotificationStorageError::ParseNotificationError(e.to_string()))
            })
            .collect()
    }

    /// Advances the lifecycle status of a notification
    ///
    /// # Errors
    ///
    /// Returns `NotificationStorageError::NotificationNotFound` if the id is
    /// unknown, or another `NotificationStorageError` if the Dynamo DB
    /// operation fails
    pub async fn update_status(
        &self,
        id: &str,
        status: NotificationStatus,
    ) -> NotificationStorageResult<()> {
        self.dynamodb_client
            .update_item()
            .table_name(&self.table_name)
            .key(
                NotificationAttribute::Id.to_string(),
                AttributeValue::S(id.to_string()),
            )
            .update_expression("SET #status = :status")
            .condition_expression("attribute_exists(#pk)")
            .expression_attribute_names("#pk", NotificationAttribute::Id.to_string())
            .expression_attribute_names("#status", NotificationAttribute::Status.to_string())
            .expression_attribute_values(":status", AttributeValue::S(status.to_string()))
            .send()
            .await
            .map_err(|err| {
                if matches!(
                    err,
                    SdkError::ServiceError(ref svc) if svc.err().is_conditional_check_failed_exception()
                ) {
                    NotificationStorageError::NotificationNotFound
                } else {
                    err.into()
                }
            })?;

        Ok(())
    }

    /// Round-trip probe used by the health endpoints
    ///
    /// # Errors
    ///
    /// Returns `NotificationStorageError` if the table cannot be described
    pub async fn health(&self) -> NotificationStorageResult<()> {
        self.dynamodb_client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn guard_ids_are_prefixed() {
        assert_eq!(
            NotificationStorage::guard_id("order-42"),
            "idempotency#order-42"
        );
    }

    #[test]
    fn priority_and_status_serialize_snake_case() {
        assert_eq!(NotificationPriority::Critical.to_string(), "critical");
        assert_eq!(NotificationStatus::Pending.to_string(), "pending");
        assert_eq!(
            serde_json::to_string(&NotificationPriority::High).unwrap(),
            "\"high\""
        );
        assert_eq!(
            serde_json::to_string(&NotificationStatus::Partial).unwrap(),
            "\"partial\""
        );
    }
}
