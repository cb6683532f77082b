//! LocalStack resource provisioning for the API flow tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_sqs::Client as SqsClient;
use uuid::Uuid;

use backend_storage::delivery_attempt::{DeliveryAttemptAttribute, NOTIFICATION_INDEX};
use backend_storage::device_subscription::{
    DeviceSubscriptionAttribute, ID_INDEX, USER_INDEX,
};
use backend_storage::notification::NotificationAttribute;
use backend_storage::notification_recipient::NotificationRecipientAttribute;

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

/// Provisions fresh tables and queues, exporting their names through the
/// environment so `Environment::Development` resolves to them
pub struct ApiTestResources {
    dynamodb_client: Arc<DynamoDbClient>,
    sqs_client: Arc<SqsClient>,
    tables: Vec<String>,
    queue_urls: Vec<String>,
    /// URL of the default-tier queue, for fan-out assertions
    pub default_queue_url: String,
}

impl ApiTestResources {
    pub async fn provision() -> Self {
        let config = super::test_router::localstack_config().await;
        let dynamodb_client = Arc::new(DynamoDbClient::new(&config));
        let sqs_client = Arc::new(SqsClient::new(&config));

        let run_id = Uuid::new_v4();
        let subscriptions_table = format!("api-test-subscriptions-{run_id}");
        let notifications_table = format!("api-test-notifications-{run_id}");
        let recipients_table = format!("api-test-recipients-{run_id}");
        let attempts_table = format!("api-test-attempts-{run_id}");

        dynamodb_client
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
            .expect("create subscriptions table");

        dynamodb_client
            .create_table()
            .table_name(&notifications_table)
            .attribute_definitions(string_attribute(NotificationAttribute::Id))
            .key_schema(hash_key(NotificationAttribute::Id))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .expect("create notifications table");

        dynamodb_client
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
            .expect("create recipients table");

        dynamodb_client
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
            .expect("create attempts table");

        let mut queue_urls = Vec::new();
        for tier in ["high", "default", "low"] {
            let result = sqs_client
                .create_queue()
                .queue_name(format!("api-test-{tier}-{run_id}.fifo"))
                .attributes(aws_sdk_sqs::types::QueueAttributeName::FifoQueue, "true")
                .send()
                .await
                .expect("create queue");
            queue_urls.push(result.queue_url().expect("queue url").to_string());
        }

        std::env::set_var("SUBSCRIPTIONS_TABLE_NAME", &subscriptions_table);
        std::env::set_var("NOTIFICATIONS_TABLE_NAME", &notifications_table);
        std::env::set_var("RECIPIENTS_TABLE_NAME", &recipients_table);
        std::env::set_var("ATTEMPTS_TABLE_NAME", &attempts_table);
        std::env::set_var("DELIVERY_QUEUE_HIGH_URL", &queue_urls[0]);
        std::env::set_var("DELIVERY_QUEUE_DEFAULT_URL", &queue_urls[1]);
        std::env::set_var("DELIVERY_QUEUE_LOW_URL", &queue_urls[2]);

        tokio::time::sleep(Duration::from_millis(200)).await;

        Self {
            dynamodb_client,
            sqs_client: sqs_client.clone(),
            tables: vec![
                subscriptions_table,
                notifications_table,
                recipients_table,
                attempts_table,
            ],
            default_queue_url: queue_urls[1].clone(),
            queue_urls,
        }
    }

    /// SQS client handle for queue-level assertions
    pub fn sqs_client(&self) -> Arc<SqsClient> {
        self.sqs_client.clone()
    }
}

impl Drop for ApiTestResources {
    fn drop(&mut self) {
        let dynamodb_client = self.dynamodb_client.clone();
        let sqs_client = self.sqs_client.clone();
        let tables = self.tables.clone();
        let queue_urls = self.queue_urls.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                for table in tables {
                    let _ = dynamodb_client.delete_table().table_name(&table).send().await;
                }
                for url in queue_urls {
                    let _ = sqs_client.delete_queue().queue_url(&url).send().await;
                }
            });
        }
    }
}
