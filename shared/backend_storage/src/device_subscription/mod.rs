//! Device subscription storage integration using Dynamo DB
//!
//! A device subscription is one browser push endpoint registered by one user.
//! The `endpoint` URL is the unit of identity: it is the partition key, and
//! uniqueness is enforced with a conditional put. Lookups by `id` and by
//! `user_id` go through global secondary indexes.

mod error;

use std::sync::Arc;

use aws_sdk_dynamodb::{
    error::SdkError,
    types::{AttributeValue, Select},
    Client as DynamoDbClient,
};
use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use error::{DeviceSubscriptionStorageError, DeviceSubscriptionStorageResult};
use strum::Display;

/// Name of the GSI keyed by subscription id
pub const ID_INDEX: &str = "id-index";
/// Name of the GSI keyed by user id
pub const USER_INDEX: &str = "user-index";

/// Attribute names for the device subscription table
#[derive(Debug, Clone, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceSubscriptionAttribute {
    /// Push endpoint URL (Primary Key)
    ///
    /// Vendor-issued HTTPS URL uniquely naming a browser subscription.
    Endpoint,
    /// Subscription id (`id-index` GSI key)
    Id,
    /// Owning user id (`user-index` GSI key)
    UserId,
    /// Whether the subscription is eligible for delivery
    IsActive,
    /// Last modification timestamp
    UpdatedAt,
}

/// One physical push endpoint of one user
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeviceSubscription {
    /// Subscription id
    pub id: String,
    /// Opaque external user id
    pub user_id: String,
    /// Push endpoint URL, globally unique
    pub endpoint: String,
    /// Base64url-encoded P-256 ECDH public key from the browser
    pub p256dh: String,
    /// Base64url-encoded authentication secret from the browser
    pub auth: String,
    /// Optional client-assigned device id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// User agent string captured at registration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// BCP-47 locale tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// IANA timezone name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Sole truth for "eligible for delivery"
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Device subscription storage client for Dynamo DB operations
#[derive(Clone)]
pub struct DeviceSubscriptionStorage {
    dynamodb_client: Arc<DynamoDbClient>,
    table_name: String,
}

impl DeviceSubscriptionStorage {
    /// Creates a new device subscription storage client
    ///
    /// # Arguments
    ///
    /// * `dynamodb_client` - Pre-configured Dynamo DB client
    /// * `table_name` - Dynamo DB table name for device subscriptions
    #[must_use]
    pub const fn new(dynamodb_client: Arc<DynamoDbClient>, table_name: String) -> Self {
        Self {
            dynamodb_client,
            table_name,
        }
    }

    /// Inserts a new device subscription, failing if the endpoint is taken
    ///
    /// # Errors
    ///
    /// Returns `DeviceSubscriptionStorageError::SubscriptionExists` if a
    /// subscription with the same endpoint already exists, or another
    /// `DeviceSubscriptionStorageError` if the Dynamo DB operation fails
    pub async fn insert(
        &self,
        subscription: &DeviceSubscription,
    ) -> DeviceSubscriptionStorageResult<()> {
        let item = serde_dynamo::to_item(subscription)
            .map_err(|e| DeviceSubscriptionStorageError::SerializationError(e.to_string()))?;

        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", DeviceSubscriptionAttribute::Endpoint.to_string())
            .send()
            .await
            .map_err(|err| {
                if matches!(
                    err,
                    SdkError::ServiceError(ref svc) if svc.err().is_conditional_check_failed_exception()
                ) {
                    DeviceSubscriptionStorageError::SubscriptionExists
                } else {
                    err.into()
                }
            })?;

        Ok(())
    }

    /// Gets a device subscription by its endpoint URL
    ///
    /// # Errors
    ///
    /// Returns `DeviceSubscriptionStorageError` if the Dynamo DB operation fails
    pub async fn get_by_endpoint(
        &self,
        endpoint: &str,
    ) -> DeviceSubscriptionStorageResult<Option<DeviceSubscription>> {
        let response = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .key(
                DeviceSubscriptionAttribute::Endpoint.to_string(),
                AttributeValue::S(endpoint.to_string()),
            )
            .send()
            .await?;

        response
            .item()
            .map(|item| {
                serde_dynamo::from_item(item.clone()).map_err(|e| {
                    DeviceSubscriptionStorageError::ParseSubscriptionError(e.to_string())
                })
            })
            .transpose()
    }

    /// Gets a device subscription by id via the `id-index` GSI
    ///
    /// # Errors
    ///
    /// Returns `DeviceSubscriptionStorageError` if the Dynamo DB operation fails
    pub async fn get_by_id(
        &self,
        id: &str,
    ) -> DeviceSubscriptionStorageResult<Option<DeviceSubscription>> {
        let response = self
            .dynamodb_client
            .query()
            .table_name(&self.table_name)
            .index_name(ID_INDEX)
            .key_condition_expression("#id = :id")
            .expression_attribute_names("#id", DeviceSubscriptionAttribute::Id.to_string())
            .expression_attribute_values(":id", AttributeValue::S(id.to_string()))
            .select(Select::AllAttributes)
            .limit(1)
            .send()
            .await?;

        response
            .items()
            .first()
            .map(|item| {
                serde_dynamo::from_item(item.clone()).map_err(|e| {
                    DeviceSubscriptionStorageError::ParseSubscriptionError(e.to_string())
                })
            })
            .transpose()
    }

    /// Lists all active subscriptions of a user via the `user-index` GSI
    ///
    /// # Errors
    ///
    /// Returns `DeviceSubscriptionStorageError` if the Dynamo DB operation fails
    pub async fn list_active_by_user(
        &self,
        user_id: &str,
    ) -> DeviceSubscriptionStorageResult<Vec<DeviceSubscription>> {
        let response = self
            .dynamodb_client
            .query()
            .table_name(&self.table_name)
            .index_name(USER_INDEX)
            .key_condition_expression("#user_id = :user_id")
            .filter_expression("#is_active = :active")
            .expression_attribute_names(
                "#user_id",
                DeviceSubscriptionAttribute::UserId.to_string(),
            )
            .expression_attribute_names(
                "#is_active",
                DeviceSubscriptionAttribute::IsActive.to_string(),
            )
            .expression_attribute_values(":user_id", AttributeValue::S(user_id.to_string()))
            .expression_attribute_values(":active", AttributeValue::Bool(true))
            .select(Select::AllAttributes)
            .send()
            .await?;

        response
            .items()
            .iter()
            .map(|item| {
                serde_dynamo::from_item(item.clone()).map_err(|e| {
                    DeviceSubscriptionStorageError::ParseSubscriptionError(e.to_string())
                })
            })
            .collect()
    }

    /// Counts the active subscriptions of a user
    ///
    /// # Errors
    ///
    /// Returns `DeviceSubscriptionStorageError` if the Dynamo DB operation fails
    pub async fn count_active_by_user(
        &self,
        user_id: &str,
    ) -> DeviceSubscriptionStorageResult<usize> {
        let response = self
            .dynamodb_client
            .query()
            .table_name(&self.table_name)
            .index_name(USER_INDEX)
            .key_condition_expression("#user_id = :user_id")
            .filter_expression("#is_active = :active")
            .expression_attribute_names(
                "#user_id",
                DeviceSubscriptionAttribute::UserId.to_string(),
            )
            .expression_attribute_names(
                "#is_active",
                DeviceSubscriptionAttribute::IsActive.to_string(),
            )
            .expression_attribute_values(":user_id", AttributeValue::S(user_id.to_string()))
            .expression_attribute_values(":active", AttributeValue::Bool(true))
            .select(Select::Count)
            .send()
            .await?;

        Ok(usize::try_from(response.count()).unwrap_or_default())
    }

    /// Marks a subscription inactive (soft delete)
    ///
    /// Deactivating an already-inactive subscription is a no-op by design of
    /// the update expression; callers may retry freely.
    ///
    /// # Errors
    ///
    /// Returns `DeviceSubscriptionStorageError::SubscriptionNotFound` if no
    /// subscription exists for the endpoint, or another
    /// `DeviceSubscriptionStorageError` if the Dynamo DB operation fails
    pub async fn deactivate(&self, endpoint: &str) -> DeviceSubscriptionStorageResult<()> {
        self.dynamodb_client
            .update_item()
            .table_name(&self.table_name)
            .key(
                DeviceSubscriptionAttribute::Endpoint.to_string(),
                AttributeValue::S(endpoint.to_string()),
            )
            .update_expression("SET #is_active = :inactive, #updated_at = :now")
            .condition_expression("attribute_exists(#pk)")
            .expression_attribute_names("#pk", DeviceSubscriptionAttribute::Endpoint.to_string())
            .expression_attribute_names(
                "#is_active",
                DeviceSubscriptionAttribute::IsActive.to_string(),
            )
            .expression_attribute_names(
                "#updated_at",
                DeviceSubscriptionAttribute::UpdatedAt.to_string(),
            )
            .expression_attribute_values(":inactive", AttributeValue::Bool(false))
            .expression_attribute_values(
                ":now",
                AttributeValue::S(Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            )
            .send()
            .await
            .map_err(|err| {
                if matches!(
                    err,
                    SdkError::ServiceError(ref svc) if svc.err().is_conditional_check_failed_exception()
                ) {
                    DeviceSubscriptionStorageError::SubscriptionNotFound
                } else {
                    err.into()
                }
            })?;

        Ok(())
    }

    /// Finds inactive subscriptions whose `updated_at` is older than `cutoff`
    ///
    /// Used by the stale-subscription sweeper. Paginates through the full
    /// table; this is an operational scan, never on a request path.
    ///
    /// # Errors
    ///
    /// Returns `DeviceSubscriptionStorageError` if the Dynamo DB operation fails
    pub async fn find_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DeviceSubscriptionStorageResult<Vec<DeviceSubscription>> {
        let mut stale = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let response = self
                .dynamodb_client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("#is_active = :inactive AND #updated_at < :cutoff")
                .expression_attribute_names(
                    "#is_active",
                    DeviceSubscriptionAttribute::IsActive.to_string(),
                )
                .expression_attribute_names(
                    "#updated_at",
                    DeviceSubscriptionAttribute::UpdatedAt.to_string(),
                )
                .expression_attribute_values(":inactive", AttributeValue::Bool(false))
                .expression_attribute_values(
                    ":cutoff",
                    AttributeValue::S(cutoff.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                )
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await?;

            for item in response.items() {
                stale.push(serde_dynamo::from_item(item.clone()).map_err(|e| {
                    DeviceSubscriptionStorageError::ParseSubscriptionError(e.to_string())
                })?);
            }

            exclusive_start_key = response.last_evaluated_key().map(ToOwned::to_owned);
            if exclusive_start_key.is_none() {
                break;
            }
        }

        Ok(stale)
    }

    /// Hard-deletes a subscription by endpoint
    ///
    /// # Errors
    ///
    /// Returns `DeviceSubscriptionStorageError` if the Dynamo DB operation fails
    pub async fn delete(&self, endpoint: &str) -> DeviceSubscriptionStorageResult<()> {
        self.dynamodb_client
            .delete_item()
            .table_name(&self.table_name)
            .key(
                DeviceSubscriptionAttribute::Endpoint.to_string(),
                AttributeValue::S(endpoint.to_string()),
            )
            .send()
            .await?;

        Ok(())
    }

    /// Round-trip probe used by the health endpoints
    ///
    /// # Errors
    ///
    /// Returns `DeviceSubscriptionStorageError` if the table cannot be described
    pub async fn health(&self) -> DeviceSubscriptionStorageResult<()> {
        self.dynamodb_client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await?;

        Ok(())
    }
}
