//! Notification recipient storage integration using Dynamo DB
//!
//! One item per (notification, user) pair, keyed by `notification_id` with
//! `user_id` as sort key. Recipients exist per user named by the producer,
//! independent of how many subscriptions that user has.

mod error;

use std::{sync::Arc, time::Duration};

use aws_sdk_dynamodb::{
    types::{AttributeValue, PutRequest, Select, WriteRequest},
    Client as DynamoDbClient,
};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use error::{NotificationRecipientStorageError, NotificationRecipientStorageResult};
use strum::Display;

/// Dynamo DB caps `BatchWriteItem` at 25 requests
const BATCH_WRITE_CHUNK: usize = 25;

/// Bounded retries for unprocessed batch items
const BATCH_WRITE_ATTEMPTS: u32 = 3;

/// Attribute names for the notification recipient table
#[derive(Debug, Clone, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationRecipientAttribute {
    /// Owning notification id (Partition Key)
    NotificationId,
    /// Recipient user id (Sort Key)
    UserId,
}

/// One (notification, user) pair
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationRecipient {
    /// Owning notification id
    pub notification_id: String,
    /// Recipient user id
    pub user_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Notification recipient storage client for Dynamo DB operations
#[derive(Clone)]
pub struct NotificationRecipientStorage {
    dynamodb_client: Arc<DynamoDbClient>,
    table_name: String,
}

impl NotificationRecipientStorage {
    /// Creates a new notification recipient storage client
    ///
    /// # Arguments
    ///
    /// * `dynamodb_client` - Pre-configured Dynamo DB client
    /// * `table_name` - Dynamo DB table name for notification recipients
    #[must_use]
    pub const fn new(dynamodb_client: Arc<DynamoDbClient>, table_name: String) -> Self {
        Self {
            dynamodb_client,
            table_name,
        }
    }

    /// Bulk-inserts the recipients of a notification
    ///
    /// Uses the native batch write in chunks of 25, retrying unprocessed
    /// items a bounded number of times. Re-writing an existing pair is a
    /// plain overwrite and therefore idempotent.
    ///
    /// # Errors
    ///
    /// Returns `NotificationRecipientStorageError::UnprocessedItems` when the
    /// table keeps throttling after retries, or another
    /// `NotificationRecipientStorageError` if the Dynamo DB operation fails
    pub async fn insert_many(
        &self,
        notification_id: &str,
        user_ids: &[String],
        created_at: DateTime<Utc>,
    ) -> NotificationRecipientStorageResult<()> {
        for chunk in user_ids.chunks(BATCH_WRITE_CHUNK) {
            let mut requests = Vec::with_capacity(chunk.len());
            for user_id in chunk {
                let recipient = NotificationRecipient {
                    notification_id: notification_id.to_string(),
                    user_id: user_id.clone(),
                    created_at,
                };
                let item = serde_dynamo::to_item(&recipient).map_err(|e| {
                    NotificationRecipientStorageError::SerializationError(e.to_string())
                })?;
                let put = PutRequest::builder().set_item(Some(item)).build().map_err(
                    |e| NotificationRecipientStorageError::BatchBuildError(e.to_string()),
                )?;
                requests.push(WriteRequest::builder().put_request(put).build());
            }

            self.write_chunk(requests).await?;
        }

        Ok(())
    }

    async fn write_chunk(
        &self,
        mut requests: Vec<WriteRequest>,
    ) -> NotificationRecipientStorageResult<()> {
        let mut backoff = Duration::from_millis(50);

        for attempt in 0..BATCH_WRITE_ATTEMPTS {
            let response = self
                .dynamodb_client
                .batch_write_item()
                .request_items(self.table_name.clone(), requests.clone())
                .send()
                .await?;

            let unprocessed = response
                .unprocessed_items()
                .and_then(|map| map.get(&self.table_name))
                .cloned()
                .unwrap_or_default();

            if unprocessed.is_empty() {
                return Ok(());
            }

            tracing::warn!(
                unprocessed = unprocessed.len(),
                attempt,
                "Recipient batch write partially throttled, retrying"
            );
            requests = unprocessed;
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }

        Err(NotificationRecipientStorageError::UnprocessedItems(
            requests.len(),
        ))
    }

    /// Inserts a single recipient
    ///
    /// # Errors
    ///
    /// Returns `NotificationRecipientStorageError` if the Dynamo DB operation fails
    pub async fn insert(
        &self,
        recipient: &NotificationRecipient,
    ) -> NotificationRecipientStorageResult<()> {
        let item = serde_dynamo::to_item(recipient).map_err(|e| {
            NotificationRecipientStorageError::SerializationError(e.to_string())
        })?;

        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await?;

        Ok(())
    }

    /// Gets one (notification, user) pair
    ///
    /// # Errors
    ///
    /// Returns `NotificationRecipientStorageError` if the Dynamo DB operation fails
    pub async fn get_one(
        &self,
        notification_id: &str,
        user_id: &str,
    ) -> NotificationRecipientStorageResult<Option<NotificationRecipient>> {
        let response = self
            .dynamodb_client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("#notification_id = :notification_id AND #user_id = :user_id")
            .expression_attribute_names(
                "#notification_id",
                NotificationRecipientAttribute::NotificationId.to_string(),
            )
            .expression_attribute_names(
                "#user_id",
                NotificationRecipientAttribute::UserId.to_string(),
            )
            .expression_attribute_values(
                ":notification_id",
                AttributeValue::S(notification_id.to_string()),
            )
            .expression_attribute_values(":user_id", AttributeValue::S(user_id.to_string()))
            .select(Select::AllAttributes)
            .limit(1)
            .send()
            .await?;

        response
            .items()
            .first()
            .map(|item| {
                serde_dynamo::from_item(item.clone()).map_err(|e| {
                    NotificationRecipientStorageError::ParseRecipientError(e.to_string())
                })
            })
            .transpose()
    }

    /// Lists all recipients of a notification
    ///
    /// # Errors
    ///
    /// Returns `NotificationRecipientStorageError` if the Dynamo DB operation fails
    pub async fn list_by_notification(
        &self,
        notification_id: &str,
    ) -> NotificationRecipientStorageResult<Vec<NotificationRecipient>> {
        let mut recipients = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let response = self
                .dynamodb_client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#notification_id = :notification_id")
                .expression_attribute_names(
                    "#notification_id",
                    NotificationRecipientAttribute::NotificationId.to_string(),
                )
                .expression_attribute_values(
                    ":notification_id",
                    AttributeValue::S(notification_id.to_string()),
                )
                .select(Select::AllAttributes)
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await?;

            for item in response.items() {
                recipients.push(serde_dynamo::from_item(item.clone()).map_err(|e| {
                    NotificationRecipientStorageError::ParseRecipientError(e.to_string())
                })?);
            }

            exclusive_start_key = response.last_evaluated_key().map(ToOwned::to_owned);
            if exclusive_start_key.is_none() {
                break;
            }
        }

        Ok(recipients)
    }
}
