//! Per-task delivery handling
//!
//! Each processor draws task envelopes from the shared channel, performs the
//! push, records the attempt, and settles the broker lease. The vendor
//! response classification is a pure decision table so the retry semantics
//! stay independently testable.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use backend_storage::{
    delivery_attempt::{DeliveryAttempt, DeliveryAttemptStatus, DeliveryAttemptStorage},
    device_subscription::{DeviceSubscription, DeviceSubscriptionStorage},
    notification::{Notification, NotificationStorage},
    queue::{delivery::retry_backoff_seconds, DeliveryQueues, DeliveryTask},
};

use super::config::WorkerConfig;
use super::types::TaskEnvelope;
use crate::push::payload::{payload_bytes, urgency_for_priority, DEFAULT_TTL_SECONDS};
use crate::push::{PushResponse, PushSendError, PushSender};

/// What the broker should see for a processed task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Delete the message; the task is settled for good
    Ack,
    /// Hand the lease back with backoff so the broker redelivers
    Retry,
}

/// Classified outcome of one push exchange, ready for the ledger
#[derive(Debug)]
pub struct PushOutcome {
    /// Ledger status
    pub status: DeliveryAttemptStatus,
    /// Vendor HTTP status when one was received
    pub http_status: Option<u16>,
    /// Wall-clock latency when a response arrived
    pub latency_ms: Option<u64>,
    /// Failure description
    pub error: Option<String>,
    /// Whether the subscription must be deactivated
    pub prune: bool,
    /// Broker settlement
    pub disposition: Disposition,
}

/// Maps a push result onto ledger status, pruning, and broker settlement
///
/// 2xx delivers. 404 and 410 are terminal vendor verdicts: the endpoint is
/// gone and the subscription gets pruned, never retried. Any other 4xx is a
/// permanent rejection of this message, recorded without retry. Only 5xx
/// and transport-level failures earn a redelivery.
#[must_use]
pub fn classify_push(result: &Result<PushResponse, PushSendError>) -> PushOutcome {
    match result {
        Ok(response) => {
            #[allow(clippy::cast_possible_truncation)]
            let latency_ms = Some(response.elapsed.as_millis() as u64);
            let http_status = Some(response.http_status);

            match response.http_status {
                200..=299 => PushOutcome {
                    status: DeliveryAttemptStatus::Delivered,
                    http_status,
                    latency_ms,
                    error: None,
                    prune: false,
                    disposition: Disposition::Ack,
                },
                404 | 410 => PushOutcome {
                    status: DeliveryAttemptStatus::Failed,
                    http_status,
                    latency_ms,
                    error: Some(format!(
                        "terminal vendor verdict (HTTP {})",
                        response.http_status
                    )),
                    prune: true,
                    disposition: Disposition::Ack,
                },
                400..=499 => PushOutcome {
                    status: DeliveryAttemptStatus::Failed,
                    http_status,
                    latency_ms,
                    error: Some(format!(
                        "permanent vendor rejection (HTTP {})",
                        response.http_status
                    )),
                    prune: false,
                    disposition: Disposition::Ack,
                },
                500..=599 => PushOutcome {
                    status: DeliveryAttemptStatus::Failed,
                    http_status,
                    latency_ms,
                    error: Some(format!(
                        "transient vendor failure (HTTP {})",
                        response.http_status
                    )),
                    prune: false,
                    disposition: Disposition::Retry,
                },
                status => PushOutcome {
                    status: DeliveryAttemptStatus::Failed,
                    http_status,
                    latency_ms,
                    error: Some(format!("unexpected vendor status (HTTP {status})")),
                    prune: false,
                    disposition: Disposition::Ack,
                },
            }
        }
        Err(err) => PushOutcome {
            status: DeliveryAttemptStatus::Failed,
            http_status: None,
            latency_ms: None,
            error: Some(err.to_string()),
            prune: false,
            disposition: if err.is_retryable() {
                Disposition::Retry
            } else {
                Disposition::Ack
            },
        },
    }
}

/// `TaskProcessor` settles individual delivery tasks
pub struct TaskProcessor {
    worker_id: usize,
    subscriptions: Arc<DeviceSubscriptionStorage>,
    notifications: Arc<NotificationStorage>,
    attempts: Arc<DeliveryAttemptStorage>,
    queues: Arc<DeliveryQueues>,
    push_sender: Arc<dyn PushSender>,
    config: WorkerConfig,
}

impl TaskProcessor {
    /// Creates a new `TaskProcessor`
    #[must_use]
    pub fn new(
        worker_id: usize,
        subscriptions: Arc<DeviceSubscriptionStorage>,
        notifications: Arc<NotificationStorage>,
        attempts: Arc<DeliveryAttemptStorage>,
        queues: Arc<DeliveryQueues>,
        push_sender: Arc<dyn PushSender>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            worker_id,
            subscriptions,
            notifications,
            attempts,
            queues,
            push_sender,
            config,
        }
    }

    /// Runs the task processor loop
    pub async fn run(
        &self,
        receiver: flume::Receiver<TaskEnvelope>,
        shutdown_token: CancellationToken,
    ) {
        info!("Task processor {} started", self.worker_id);

        loop {
            tokio::select! {
                () = shutdown_token.cancelled() => {
                    info!("Task processor {} received shutdown signal", self.worker_id);
                    break;
                }
                result = receiver.recv_async() => {
                    match result {
                        Ok(envelope) => self.process(envelope).await,
                        Err(flume::RecvError::Disconnected) => {
                            info!("Task channel closed for processor {}", self.worker_id);
                            break;
                        }
                    }
                }
            }
        }

        info!("Task processor {} stopped", self.worker_id);
    }

    /// Handles one envelope and settles its broker lease
    async fn process(&self, envelope: TaskEnvelope) {
        let disposition = self.handle(&envelope).await;
        let queue = self.queues.tier(envelope.tier);

        let settle = match disposition {
            Disposition::Ack => queue.ack_message(&envelope.message.receipt_handle).await,
            Disposition::Retry => {
                metrics::counter!("task_retries_total").increment(1);
                queue
                    .nack_message(
                        &envelope.message.receipt_handle,
                        retry_backoff_seconds(envelope.message.receive_count),
                    )
                    .await
            }
        };

        if let Err(err) = settle {
            // The lease expires on its own; at-least-once covers us
            error!(
                message_id = %envelope.message.message_id,
                "Failed to settle task lease: {err}"
            );
        }
    }

    async fn handle(&self, envelope: &TaskEnvelope) -> Disposition {
        let task = &envelope.message.body;
        let retry_count = envelope.message.receive_count.saturating_sub(1);

        if retry_count > self.config.max_retries {
            warn!(
                notification_id = %task.notification_id,
                subscription_id = %task.subscription_id,
                retry_count,
                "Task exhausted its retries"
            );
            self.record_attempt(
                task,
                Some(task.subscription_id.clone()),
                retry_count,
                &PushOutcome {
                    status: DeliveryAttemptStatus::Failed,
                    http_status: None,
                    latency_ms: None,
                    error: Some("retry limit exceeded".to_string()),
                    prune: false,
                    disposition: Disposition::Ack,
                },
            )
            .await;
            return Disposition::Ack;
        }

        // Load the subscription; a vanished or inactive one ends the task
        // without any network call.
        let subscription = match self.subscriptions.get_by_id(&task.subscription_id).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                self.record_attempt(
                    task,
                    None,
                    retry_count,
                    &PushOutcome {
                        status: DeliveryAttemptStatus::Skipped,
                        http_status: None,
                        latency_ms: None,
                        error: Some("subscription no longer exists".to_string()),
                        prune: false,
                        disposition: Disposition::Ack,
                    },
                )
                .await;
                return Disposition::Ack;
            }
            Err(err) => {
                warn!(
                    subscription_id = %task.subscription_id,
                    "Transient subscription load failure: {err}"
                );
                return Disposition::Retry;
            }
        };

        if !subscription.is_active {
            self.record_attempt(
                task,
                Some(subscription.id.clone()),
                retry_count,
                &PushOutcome {
                    status: DeliveryAttemptStatus::Pruned,
                    http_status: None,
                    latency_ms: None,
                    error: None,
                    prune: true,
                    disposition: Disposition::Ack,
                },
            )
            .await;
            return Disposition::Ack;
        }

        let notification = match self.notifications.get_by_id(&task.notification_id).await {
            Ok(Some(notification)) => notification,
            Ok(None) => {
                self.record_attempt(
                    task,
                    Some(subscription.id.clone()),
                    retry_count,
                    &PushOutcome {
                        status: DeliveryAttemptStatus::Failed,
                        http_status: None,
                        latency_ms: None,
                        error: Some("notification no longer exists".to_string()),
                        prune: false,
                        disposition: Disposition::Ack,
                    },
                )
                .await;
                return Disposition::Ack;
            }
            Err(err) => {
                warn!(
                    notification_id = %task.notification_id,
                    "Transient notification load failure: {err}"
                );
                return Disposition::Retry;
            }
        };

        let outcome = self.push(&subscription, &notification, retry_count).await;

        if outcome.prune {
            self.prune_subscription(&subscription).await;
        }

        self.record_attempt(task, Some(subscription.id.clone()), retry_count, &outcome)
            .await;

        metrics::counter!(
            "delivery_attempts_total",
            "status" => outcome.status.to_string()
        )
        .increment(1);
        if let Some(latency_ms) = outcome.latency_ms {
            #[allow(clippy::cast_precision_loss)]
            metrics::histogram!("push_latency_ms").record(latency_ms as f64);
        }

        outcome.disposition
    }

    /// Runs the push exchange for one loaded (subscription, notification)
    async fn push(
        &self,
        subscription: &DeviceSubscription,
        notification: &Notification,
        retry_count: u32,
    ) -> PushOutcome {
        let payload = match payload_bytes(notification) {
            Ok(payload) => payload,
            Err(err) => {
                return PushOutcome {
                    status: DeliveryAttemptStatus::Failed,
                    http_status: None,
                    latency_ms: None,
                    error: Some(format!("failed to serialize push payload: {err}")),
                    prune: false,
                    disposition: Disposition::Ack,
                };
            }
        };

        let ttl_seconds = notification.ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS);
        let urgency = urgency_for_priority(notification.priority);

        let result = self
            .push_sender
            .send(subscription, &payload, ttl_seconds, urgency)
            .await;

        let outcome = classify_push(&result);
        info!(
            worker_id = self.worker_id,
            notification_id = %notification.id,
            subscription_id = %subscription.id,
            status = %outcome.status,
            http_status = outcome.http_status,
            retry_count,
            "Push attempt finished"
        );

        outcome
    }

    /// Terminal vendor verdict: flip the subscription off
    ///
    /// A failure here is logged only; the next task against the same
    /// subscription re-observes the verdict or finds it already inactive.
    async fn prune_subscription(&self, subscription: &DeviceSubscription) {
        match self.subscriptions.deactivate(&subscription.endpoint).await {
            Ok(()) => {
                metrics::counter!("subscriptions_pruned_total").increment(1);
                info!(
                    subscription_id = %subscription.id,
                    "Subscription deactivated after terminal vendor verdict"
                );
            }
            Err(err) => {
                error!(
                    subscription_id = %subscription.id,
                    "Failed to deactivate dead subscription: {err}"
                );
            }
        }
    }

    /// Best-effort ledger write; never influences the broker settlement
    ///
    /// Retrying the push because the ledger write failed would duplicate a
    /// delivery the vendor already accepted.
    async fn record_attempt(
        &self,
        task: &DeliveryTask,
        subscription_id: Option<String>,
        retry_count: u32,
        outcome: &PushOutcome,
    ) {
        let attempt = DeliveryAttempt {
            id: Uuid::new_v4().to_string(),
            notification_id: task.notification_id.clone(),
            subscription_id,
            user_id: task.user_id.clone(),
            status: outcome.status,
            http_status: outcome.http_status,
            latency_ms: outcome.latency_ms,
            error: outcome.error.clone(),
            retry_count,
            pruned: outcome.prune || outcome.status == DeliveryAttemptStatus::Pruned,
            created_at: Utc::now(),
        };

        if let Err(err) = self.attempts.insert(&attempt).await {
            error!(
                notification_id = %task.notification_id,
                subscription_id = %task.subscription_id,
                "Failed to record delivery attempt: {err}"
            );
        }
    }
}
