//! LocalStack test setup utilities
//!
//! Everything here expects LocalStack on `http://localhost:4566`; suites
//! using it are `#[ignore]`d so the default test run stays hermetic.

#![allow(dead_code)]

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_sqs::Client as SqsClient;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use backend_storage::delivery_attempt::{
    DeliveryAttemptAttribute, NOTIFICATION_INDEX,
};
use backend_storage::device_subscription::{
    DeviceSubscriptionAttribute, ID_INDEX, USER_INDEX,
};
use backend_storage::notification::{NotificationAttribute, DEDUPE_INDEX};
use backend_storage::notification_recipient::NotificationRecipientAttribute;

/// Shared LocalStack AWS config
pub async fn localstack_config() -> aws_config::SdkConfig {
    let credentials = Credentials::from_keys("test", "test", None);

    aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url("http://localhost:4566")
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .load()
        .await
}

fn string_attribute(name: impl ToString) -> AttributeDefinition {
    AttributeDefinition::builder()
        .attribute_name(name.to_string())
        .attribute_type(ScalarAttributeType::S)
        .build()
        .unwrap()
}

fn hash_key(name: impl ToString) -> KeySchemaElement {
    KeySchemaElement::builder()
        .attribute_name(name.to_string())
        .key_type(KeyType::Hash)
        .build()
        .unwrap()
}

fn range_key(name: impl ToString) -> KeySchemaElement {
    KeySchemaElement::builder()
        .attribute_name(name.to_string())
        .key_type(KeyType::Range)
        .build()
        .unwrap()
}

fn gsi(
    index_name: &str,
    hash: impl ToString,
    range: Option<&str>,
) -> GlobalSecondaryIndex {
    let mut builder = GlobalSecondaryIndex::builder()
        .index_name(index_name)
        .key_schema(hash_key(hash));
    if let Some(range) = range {
        builder = builder.key_schema(range_key(range));
    }
    builder
        .projection(
            Projection::builder()
                .projection_type(ProjectionType::All)
                .build(),
        )
        .build()
        .unwrap()
}

/// Creates every table the service uses, with unique test names
pub struct DynamoDbTestSetup {
    client: Arc<DynamoDbClient>,
    pub subscriptions_table: String,
    pub notifications_table: String,
    pub recipients_table: String,
    pub attempts_table: String,
}

impl DynamoDbTestSetup {
    pub async fn new(client: Arc<DynamoDbClient>) -> Self {
        let run_id = Uuid::new_v4();
        let subscriptions_table = format!("test-subscriptions-{run_id}");
        let notifications_table = format!("test-notifications-{run_id}");
        let recipients_table = format!("test-recipients-{run_id}");
        let attempts_table = format!("test-attempts-{run_id}");

        // Device subscriptions: endpoint PK, id + user GSIs
        client
            .create_table()
            .table_name(&subscriptions_table)
            .attribute_definitions(string_attribute(DeviceSubscriptionAttribute::Endpoint))
            .attribute_definitions(string_attribute(DeviceSubscriptionAttribute::Id))
            .attribute_definitions(string_attribute(DeviceSubscriptionAttribute::UserId))
            .key_schema(hash_key(DeviceSubscriptionAttribute::Endpoint))
            .global_secondary_indexes(gsi(ID_INDEX, DeviceSubscriptionAttribute::Id, None))
            .global_secondary_indexes(gsi(USER_INDEX, DeviceSubscriptionAttribute::UserId, None))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .expect("Failed to create subscriptions table");

        // Notifications: id PK, dedupe GSI
        client
            .create_table()
            .table_name(&notifications_table)
            .attribute_definitions(string_attribute(NotificationAttribute::Id))
            .attribute_definitions(string_attribute(NotificationAttribute::DedupeKey))
            .attribute_definitions(string_attribute(NotificationAttribute::CreatedAt))
            .key_schema(hash_key(NotificationAttribute::Id))
            .global_secondary_indexes(gsi(
                DEDUPE_INDEX,
                NotificationAttribute::DedupeKey,
                Some(&NotificationAttribute::CreatedAt.to_string()),
            ))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .expect("Failed to create notifications table");

        // Recipients: (notification_id, user_id) composite key
        client
            .create_table()
            .table_name(&recipients_table)
            .attribute_definitions(string_attribute(
                NotificationRecipientAttribute::NotificationId,
            ))
            .attribute_definitions(string_attribute(NotificationRecipientAttribute::UserId))
            .key_schema(hash_key(NotificationRecipientAttribute::NotificationId))
            .key_schema(range_key(NotificationRecipientAttribute::UserId))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .expect("Failed to create recipients table");

        // Attempts: id PK, notification GSI ordered by created_at
        client
            .create_table()
            .table_name(&attempts_table)
            .attribute_definitions(string_attribute("id"))
            .attribute_definitions(string_attribute(
                DeliveryAttemptAttribute::NotificationId,
            ))
            .attribute_definitions(string_attribute(DeliveryAttemptAttribute::CreatedAt))
            .key_schema(hash_key("id"))
            .global_secondary_indexes(gsi(
                NOTIFICATION_INDEX,
                DeliveryAttemptAttribute::NotificationId,
                Some(&DeliveryAttemptAttribute::CreatedAt.to_string()),
            ))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .expect("Failed to create attempts table");

        // Wait for the tables to be ready
        tokio::time::sleep(Duration::from_millis(200)).await;

        Self {
            client,
            subscriptions_table,
            notifications_table,
            recipients_table,
            attempts_table,
        }
    }
}

impl Drop for DynamoDbTestSetup {
    fn drop(&mut self) {
        let client = self.client.clone();
        let tables = [
            self.subscriptions_table.clone(),
            self.notifications_table.clone(),
            self.recipients_table.clone(),
            self.attempts_table.clone(),
        ];

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                for table in tables {
                    let _ = client.delete_table().table_name(&table).send().await;
                }
            });
        }
    }
}

/// Test context that provides an SQS client and one FIFO queue
pub struct QueueTestContext {
    pub sqs_client: Arc<SqsClient>,
    pub queue_url: String,
}

impl QueueTestContext {
    /// Creates a new test context with a unique FIFO queue
    pub async fn new(test_name: &str) -> Self {
        let queue_name = format!("{}-{}.fifo", test_name, Uuid::new_v4());

        let config = localstack_config().await;
        let sqs_client = Arc::new(SqsClient::new(&config));

        let result = sqs_client
            .create_queue()
            .queue_name(&queue_name)
            .attributes(aws_sdk_sqs::types::QueueAttributeName::FifoQueue, "true")
            .send()
            .await
            .expect("Failed to create test queue");

        let queue_url = result
            .queue_url()
            .expect("Queue URL not returned")
            .to_string();

        Self {
            sqs_client,
            queue_url,
        }
    }
}

impl Drop for QueueTestContext {
    fn drop(&mut self) {
        let client = self.sqs_client.clone();
        let queue_url = self.queue_url.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = client.delete_queue().queue_url(&queue_url).send().await;
            });
        }
    }
}
