//! Delivery attempt storage integration using Dynamo DB
//!
//! One item per vendor-endpoint call, the at-least-once ledger of the
//! delivery pipeline. Listing by notification goes through the
//! `notification-index` GSI sorted by `created_at`.

mod error;

use std::sync::Arc;

use aws_sdk_dynamodb::{
    types::{AttributeValue, Select},
    Client as DynamoDbClient,
};
use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use error::{DeliveryAttemptStorageError, DeliveryAttemptStorageResult};
use strum::Display;

/// Name of the GSI keyed by notification id with `created_at` as sort key
pub const NOTIFICATION_INDEX: &str = "notification-index";

/// Attribute names for the delivery attempt table
#[derive(Debug, Clone, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryAttemptAttribute {
    /// Owning notification id (`notification-index` GSI key)
    NotificationId,
    /// Creation timestamp (`notification-index` GSI sort key)
    CreatedAt,
}

/// Terminal state of one vendor-endpoint call
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryAttemptStatus {
    /// Vendor accepted the push (2xx)
    Delivered,
    /// Vendor or transport rejected the push
    Failed,
    /// No push was made; the subscription was gone before sending
    Skipped,
    /// No push was made; the subscription was already deactivated
    Pruned,
}

/// One execution of the push HTTP call for a (notification, subscription) pair
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeliveryAttempt {
    /// Attempt id
    pub id: String,
    /// Owning notification id
    pub notification_id: String,
    /// Target subscription; `None` when the subscription row vanished first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    /// Recipient user id
    pub user_id: String,
    /// Outcome classification
    pub status: DeliveryAttemptStatus,
    /// Raw vendor HTTP status when one was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Wall-clock latency of the vendor call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Human-readable failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Count of prior failed attempts for this (notification, subscription)
    pub retry_count: u32,
    /// Whether this attempt deactivated the subscription
    pub pruned: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Aggregated attempt counters for a time window
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct DeliveryAttemptStats {
    /// All attempts in the window
    pub total: u64,
    /// Attempts with status `delivered`
    pub delivered: u64,
    /// Attempts with status `failed`
    pub failed: u64,
    /// Mean latency across attempts that recorded one
    pub mean_latency_ms: Option<f64>,
}

/// Delivery attempt storage client for Dynamo DB operations
#[derive(Clone)]
pub struct DeliveryAttemptStorage {
    dynamodb_client: Arc<DynamoDbClient>,
    table_name: String,
}

impl DeliveryAttemptStorage {
    /// Creates a new delivery attempt storage client
    ///
    /// # Arguments
    ///
    /// * `dynamodb_client` - Pre-configured Dynamo DB client
    /// * `table_name` - Dynamo DB table name for delivery attempts
    #[must_use]
    pub const fn new(dynamodb_client: Arc<DynamoDbClient>, table_name: String) -> Self {
        Self {
            dynamodb_client,
            table_name,
        }
    }

    /// Inserts one delivery attempt
    ///
    /// # Errors
    ///
    /// Returns `DeliveryAttemptStorageError` if the Dynamo DB operation fails
    pub async fn insert(&self, attempt: &DeliveryAttempt) -> DeliveryAttemptStorageResult<()> {
        let item = serde_dynamo::to_item(attempt)
            .map_err(|e| DeliveryAttemptStorageError::SerializationError(e.to_string()))?;

        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await?;

        Ok(())
    }

    /// Lists the attempts of a notification, newest first
    ///
    /// # Errors
    ///
    /// Returns `DeliveryAttemptStorageError` if the Dynamo DB operation fails
    pub async fn list_by_notification(
        &self,
        notification_id: &str,
    ) -> DeliveryAttemptStorageResult<Vec<DeliveryAttempt>> {
        let mut attempts = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let response = self
                .dynamodb_client
                .query()
                .table_name(&self.table_name)
                .index_name(NOTIFICATION_INDEX)
                .key_condition_expression("#notification_id = :notification_id")
                .expression_attribute_names(
                    "#notification_id",
                    DeliveryAttemptAttribute::NotificationId.to_string(),
                )
                .expression_attribute_values(
                    ":notification_id",
                    AttributeValue::S(notification_id.to_string()),
                )
                .select(Select::AllAttributes)
                .scan_index_forward(false)
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await?;

            for item in response.items() {
                attempts.push(serde_dynamo::from_item(item.clone()).map_err(|e| {
                    DeliveryAttemptStorageError::ParseAttemptError(e.to_string())
                })?);
            }

            exclusive_start_key = response.last_evaluated_key().map(ToOwned::to_owned);
            if exclusive_start_key.is_none() {
                break;
            }
        }

        Ok(attempts)
    }

    /// Aggregates attempt counters since `cutoff`
    ///
    /// Full-table scan aggregated client side; an operational reporting call,
    /// never on the delivery path.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryAttemptStorageError` if the Dynamo DB operation fails
    pub async fn stats_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DeliveryAttemptStorageResult<DeliveryAttemptStats> {
        let mut stats = DeliveryAttemptStats::default();
        let mut latency_sum = 0u64;
        let mut latency_count = 0u64;
        let mut exclusive_start_key = None;

        loop {
            let response = self
                .dynamodb_client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("#created_at > :cutoff")
                .expression_attribute_names(
                    "#created_at",
                    DeliveryAttemptAttribute::CreatedAt.to_string(),
                )
                .expression_attribute_values(
                    ":cutoff",
                    AttributeValue::S(cutoff.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                )
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await?;

            for item in response.items() {
                let attempt: DeliveryAttempt = serde_dynamo::from_item(item.clone())
                    .map_err(|e| DeliveryAttemptStorageError::ParseAttemptError(e.to_string()))?;

                stats.total += 1;
                match attempt.status {
                    DeliveryAttemptStatus::Delivered => stats.delivered += 1,
                    DeliveryAttemptStatus::Failed => stats.failed += 1,
                    DeliveryAttemptStatus::Skipped | DeliveryAttemptStatus::Pruned => {}
                }
                if let Some(latency) = attempt.latency_ms {
                    latency_sum += latency;
                    latency_count += 1;
                }
            }

            exclusive_start_key = response.last_evaluated_key().map(ToOwned::to_owned);
            if exclusive_start_key.is_none() {
                break;
            }
        }

        if latency_count > 0 {
            #[allow(clippy::cast_precision_loss)]
            {
                stats.mean_latency_ms = Some(latency_sum as f64 / latency_count as f64);
            }
        }

        Ok(stats)
    }
}
