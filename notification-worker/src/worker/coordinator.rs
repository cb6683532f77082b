//! Worker lifecycle management
//!
//! The coordinator wires the weighted poller to a pool of task processors
//! over a bounded channel and owns the shutdown sequence: stop polling,
//! let processors drain, abandon whatever is still running once the grace
//! period lapses (the broker redelivers those leases).

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use backend_storage::{
    delivery_attempt::DeliveryAttemptStorage, device_subscription::DeviceSubscriptionStorage,
    notification::NotificationStorage, queue::DeliveryQueues,
};

use super::config::WorkerConfig;
use super::poller::QueuePoller;
use super::processor::TaskProcessor;
use super::types::TaskEnvelope;
use crate::push::PushSender;

/// Storage and client handles the worker components share
pub struct WorkerDependencies {
    /// Device subscription storage
    pub subscriptions: Arc<DeviceSubscriptionStorage>,
    /// Notification storage
    pub notifications: Arc<NotificationStorage>,
    /// Delivery attempt storage
    pub attempts: Arc<DeliveryAttemptStorage>,
    /// Delivery task queues
    pub queues: Arc<DeliveryQueues>,
    /// Push protocol client
    pub push_sender: Arc<dyn PushSender>,
}

/// Coordinator manages the lifecycle of all worker components
pub struct Coordinator {
    config: WorkerConfig,
    shutdown_token: CancellationToken,
}

impl Coordinator {
    /// Creates a new Coordinator
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Returns a clone of the shutdown token for external control
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Starts the poller and processor pool and runs until shutdown
    pub async fn start(self, dependencies: WorkerDependencies) {
        info!(
            "Starting coordinator with {} task processors",
            self.config.num_workers
        );

        // Bounded channel between the poller and the processors
        let (task_tx, task_rx) = flume::bounded::<TaskEnvelope>(self.config.channel_capacity());

        let processor_handles = self.spawn_processors(&dependencies, task_rx);

        let poller = QueuePoller::new(
            Arc::clone(&dependencies.queues),
            task_tx,
            self.shutdown_token.clone(),
        );
        let poller_handle = tokio::spawn(poller.run());

        // The poller only returns on shutdown or a dead channel
        if let Err(e) = poller_handle.await {
            error!("Queue poller task error: {e}");
        }

        self.shutdown_token.cancel();
        info!("Coordinator shutdown initiated");

        let drain = async {
            for handle in processor_handles {
                if let Err(e) = handle.await {
                    error!("Processor task error: {e}");
                }
            }
        };

        if tokio::time::timeout(self.config.shutdown_grace, drain)
            .await
            .is_err()
        {
            warn!(
                "Shutdown grace of {:?} elapsed with handlers still in flight; their leases will redeliver",
                self.config.shutdown_grace
            );
        }

        info!("All workers stopped");
    }

    /// Spawns the task processor pool
    fn spawn_processors(
        &self,
        dependencies: &WorkerDependencies,
        receiver: flume::Receiver<TaskEnvelope>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        for worker_id in 0..self.config.num_workers {
            let processor = TaskProcessor::new(
                worker_id,
                Arc::clone(&dependencies.subscriptions),
                Arc::clone(&dependencies.notifications),
                Arc::clone(&dependencies.attempts),
                Arc::clone(&dependencies.queues),
                Arc::clone(&dependencies.push_sender),
                self.config.clone(),
            );
            let rx = receiver.clone();
            let shutdown_token = self.shutdown_token.clone();

            let handle = tokio::spawn(async move {
                processor.run(rx, shutdown_token).await;
            });

            handles.push(handle);
        }

        handles
    }
}
