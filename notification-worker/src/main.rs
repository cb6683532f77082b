use std::sync::Arc;

use dotenvy::dotenv;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_sqs::Client as SqsClient;

use backend_storage::{
    delivery_attempt::DeliveryAttemptStorage,
    device_subscription::DeviceSubscriptionStorage,
    notification::NotificationStorage,
    queue::{delivery::QueueTier, DeliveryQueues},
};
use notification_worker::{
    health::start_health_server,
    push::WebPushSender,
    types::Environment,
    worker::{Coordinator, StaleSubscriptionSweeper, WorkerConfig, WorkerDependencies},
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
    let config = WorkerConfig::from_environment(environment);
    let aws_config = environment.aws_config().await;

    let dynamodb_client = Arc::new(DynamoDbClient::new(&aws_config));
    let sqs_client = Arc::new(SqsClient::new(&aws_config));

    let subscriptions = Arc::new(DeviceSubscriptionStorage::new(
        dynamodb_client.clone(),
        environment.subscriptions_table(),
    ));
    let notifications = Arc::new(NotificationStorage::new(
        dynamodb_client.clone(),
        environment.notifications_table(),
    ));
    let attempts = Arc::new(DeliveryAttemptStorage::new(
        dynamodb_client,
        environment.attempts_table(),
    ));
    let queues = Arc::new(DeliveryQueues::new(
        sqs_client,
        environment.delivery_queue_config(QueueTier::High),
        environment.delivery_queue_config(QueueTier::Default),
        environment.delivery_queue_config(QueueTier::Low),
    ));
    let push_sender = Arc::new(WebPushSender::new(
        environment.vapid_private_key(),
        config.push_timeout,
    ));

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    let coordinator = Coordinator::new(config);
    let shutdown_token = coordinator.shutdown_token();

    // Health listener and sweeper ride the same shutdown token
    let health_handle = tokio::spawn(start_health_server(
        environment.port(),
        subscriptions.clone(),
        metrics_handle,
        shutdown_token.clone(),
    ));

    let sweeper = StaleSubscriptionSweeper::new(subscriptions.clone(), shutdown_token.clone());
    let sweeper_handle = tokio::spawn(sweeper.run());

    // Trip the token on SIGINT/SIGTERM
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    let dependencies = WorkerDependencies {
        subscriptions,
        notifications,
        attempts,
        queues,
        push_sender,
    };

    coordinator.start(dependencies).await;

    if let Err(e) = sweeper_handle.await {
        error!("Sweeper task error: {e}");
    }
    match health_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Health server error: {e}"),
        Err(e) => error!("Health server task error: {e}"),
    }

    Ok(())
}

/// Resolves when the process receives SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
