use std::sync::Arc;

use dotenvy::dotenv;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_sqs::Client as SqsClient;

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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let environment = Environment::from_env();
    let aws_config = environment.aws_config().await;

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

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    server::start(environment, dependencies, metrics_handle).await
}
