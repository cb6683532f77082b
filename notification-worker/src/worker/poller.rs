//! Weighted queue polling
//!
//! One poller drains the three tier queues in a 6 : 3 : 1 weighted
//! round-robin and feeds the bounded task channel the processors share.
//! Backpressure is the channel bound: a full channel pauses polling, and
//! unpolled messages simply stay leased to no one.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use backend_storage::queue::{delivery::QueueTier, DeliveryQueues};

use super::types::TaskEnvelope;

/// Pause after a failed poll so a broken broker is not hammered
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// `QueuePoller` feeds dequeued tasks into the processor channel
pub struct QueuePoller {
    queues: Arc<DeliveryQueues>,
    sender: flume::Sender<TaskEnvelope>,
    shutdown_token: CancellationToken,
}

impl QueuePoller {
    /// Creates a new `QueuePoller`
    #[must_use]
    pub fn new(
        queues: Arc<DeliveryQueues>,
        sender: flume::Sender<TaskEnvelope>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            queues,
            sender,
            shutdown_token,
        }
    }

    /// Runs the weighted polling loop until shutdown
    pub async fn run(self) {
        let schedule = QueueTier::weighted_schedule();
        info!(
            "Queue poller started, schedule: {:?}",
            schedule.iter().map(ToString::to_string).collect::<Vec<_>>()
        );

        'outer: loop {
            for tier in &schedule {
                if self.shutdown_token.is_cancelled() {
                    break 'outer;
                }

                let polled = tokio::select! {
                    () = self.shutdown_token.cancelled() => break 'outer,
                    polled = self.queues.tier(*tier).poll_messages() => polled,
                };

                match polled {
                    Ok(messages) => {
                        for message in messages {
                            let envelope = TaskEnvelope {
                                tier: *tier,
                                message,
                            };
                            if self.sender.send_async(envelope).await.is_err() {
                                // All processors are gone; nothing left to feed
                                break 'outer;
                            }
                        }
                    }
                    Err(err) => {
                        error!(tier = %tier, "Failed to poll delivery queue: {err}");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    }
                }
            }
        }

        info!("Queue poller stopped");
    }
}
