use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_sqs::Client as SqsClient;
use metrics_exporter_prometheus::PrometheusBuilder;

use backend::{
    server::{self, Dependencies},
    types::Environment,
};
use backend_storage::{
    delivery_attempt::DeliveryAttemptStorage,
    device_subscription::DeviceSubscriptionStorage,
    notification::NotificationStorage,
    notification_recipient::NotificationRecipientStorage,
    queue::{delivery::QueueTier, DeliveryQueues},
};

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

/// Builds the full application router against the development environment
///
/// The AWS clients point at LocalStack; hermetic tests only exercise paths
/// that reject before any storage call, integration tests (`#[ignore]`)
/// expect LocalStack to be running.
pub async fn get_test_router() -> axum::Router {
    super::setup_test_env();

    let environment = Environment::Development;

    let aws_config = localstack_config().await;

    let dynamodb_client = Arc::new(DynamoDbClient::new(&aws_config));
    let sqs_client = Arc::new(SqsClient::new(&aws_config));

    let dependencies = Dependencies {
        subscriptions: Arc::new(DeviceSubscriptionStorage::new(
            dynamodb_client.clone(),
            environment.subscriptions_table(),
        )),
        notifications: Arc::new(NotificationStorage::new(
            dynamodb_client.clone(),
            environment.notifications_table(),
        )),
        recipients: Arc::new(NotificationRecipientStorage::new(
            dynamodb_client.clone(),
            environment.recipients_table(),
        )),
        attempts: Arc::new(DeliveryAttemptStorage::new(
            dynamodb_client,
            environment.attempts_table(),
        )),
        queues: Arc::new(DeliveryQueues::new(
            sqs_client,
            environment.delivery_queue_config(QueueTier::High),
            environment.delivery_queue_config(QueueTier::Default),
            environment.delivery_queue_config(QueueTier::Low),
        )),
    };

    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    server::router(environment, dependencies, metrics_handle)
}
