//! LocalStack setup for worker integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_sqs::Client as SqsClient;
use uuid::Uuid;
use web_push::Urgency;

use backend_storage::delivery_attempt::{DeliveryAttemptAttribute, NOTIFICATION_INDEX};
use backend_storage::device_subscription::{
    DeviceSubscription, DeviceSubscriptionAttribute, ID_INDEX, USER_INDEX,
};
use backend_storage::notification::NotificationAttribute;
use notification_worker::push::{PushResponse, PushSendError, PushSender};

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

fn gsi(index_name: &str, hash: impl ToString, range: Option<String>) -> GlobalSecondaryIndex {
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

/// Tables the worker touches, with unique test names
pub struct WorkerTestTables {
    client: Arc<DynamoDbClient>,
    pub subscriptions_table: String,
    pub notifications_table: String,
    pub attempts_table: String,
}

impl WorkerTestTables {
    pub async fn new(client: Arc<DynamoDbClient>) -> Self {
        let run_id = Uuid::new_v4();
        let subscriptions_table = format!("worker-test-subscriptions-{run_id}");
        let notifications_table = format!("worker-test-notifications-{run_id}");
        let attempts_table = format!("worker-test-attempts-{run_id}");

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

        client
            .create_table()
            .table_name(&notifications_table)
            .attribute_definitions(string_attribute(NotificationAttribute::Id))
            .key_schema(hash_key(NotificationAttribute::Id))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .expect("Failed to create notifications table");

        client
            .create_table()
            .table_name(&attempts_table)
            .attribute_definitions(string_attribute("id"))
            .attribute_definitions(string_attribute(DeliveryAttemptAttribute::NotificationId))
            .attribute_definitions(string_attribute(DeliveryAttemptAttribute::CreatedAt))
            .key_schema(hash_key("id"))
            .global_secondary_indexes(gsi(
                NOTIFICATION_INDEX,
                DeliveryAttemptAttribute::NotificationId,
                Some(DeliveryAttemptAttribute::CreatedAt.to_string()),
            ))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .expect("Failed to create attempts table");

        tokio::time::sleep(Duration::from_millis(200)).await;

        Self {
            client,
            subscriptions_table,
            notifications_table,
            attempts_table,
        }
    }
}

impl Drop for WorkerTestTables {
    fn drop(&mut self) {
        let client = self.client.clone();
        let tables = [
            self.subscriptions_table.clone(),
            self.notifications_table.clone(),
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

/// One FIFO queue per tier, unique per test run
pub struct WorkerTestQueues {
    sqs_client: Arc<SqsClient>,
    pub urls: [String; 3],
}

impl WorkerTestQueues {
    pub async fn new(sqs_client: Arc<SqsClient>, test_name: &str) -> Self {
        let run_id = Uuid::new_v4();
        let mut urls = Vec::new();

        for tier in ["high", "default", "low"] {
            let queue_name = format!("{test_name}-{tier}-{run_id}.fifo");
            let result = sqs_client
                .create_queue()
                .queue_name(&queue_name)
                .attributes(aws_sdk_sqs::types::QueueAttributeName::FifoQueue, "true")
                .send()
                .await
                .expect("Failed to create test queue");
            urls.push(result.queue_url().expect("queue url").to_string());
        }

        Self {
            sqs_client,
            urls: urls.try_into().unwrap(),
        }
    }
}

impl Drop for WorkerTestQueues {
    fn drop(&mut self) {
        let client = self.sqs_client.clone();
        let urls = self.urls.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                for url in urls {
                    let _ = client.delete_queue().queue_url(&url).send().await;
                }
            });
        }
    }
}

/// Push sender that replays a scripted response sequence and counts calls
pub struct ScriptedPushSender {
    responses: Mutex<VecDeque<Result<PushResponse, PushSendError>>>,
    calls: AtomicUsize,
}

impl ScriptedPushSender {
    pub fn new(responses: Vec<Result<PushResponse, PushSendError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_statuses(statuses: &[u16]) -> Self {
        Self::new(
            statuses
                .iter()
                .map(|status| {
                    Ok(PushResponse {
                        http_status: *status,
                        body: None,
                        elapsed: Duration::from_millis(12),
                    })
                })
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushSender for ScriptedPushSender {
    async fn send(
        &self,
        _subscription: &DeviceSubscription,
        _payload: &[u8],
        _ttl_seconds: u32,
        _urgency: Urgency,
    ) -> Result<PushResponse, PushSendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(PushResponse {
                    http_status: 201,
                    body: None,
                    elapsed: Duration::from_millis(12),
                })
            })
    }
}
