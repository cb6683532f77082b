//! Priority-tiered delivery task queues
//!
//! Three FIFO queues back the delivery pipeline. A notification's priority
//! selects its tier at enqueue time; the worker drains the tiers with a
//! 6 : 3 : 1 weighted schedule.

use rand::Rng;
use std::sync::Arc;
use strum::Display;

use crate::notification::NotificationPriority;
use crate::queue::{
    error::QueueResult,
    sqs_queue::SqsQueue,
    types::{DeliveryTask, QueueConfig},
};
use aws_sdk_sqs::Client as SqsClient;

/// Backoff base delay for the first retry (seconds)
const BACKOFF_BASE_SECONDS: i64 = 5;

/// Upper bound on the retry delay (seconds)
const BACKOFF_CAP_SECONDS: i64 = 600;

/// One of the three delivery queue tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum QueueTier {
    /// `critical` and `high` priority notifications
    High,
    /// `normal` priority notifications
    Default,
    /// `low` priority notifications
    Low,
}

impl QueueTier {
    /// All tiers, highest first
    pub const ALL: [Self; 3] = [Self::High, Self::Default, Self::Low];

    /// Relative drain weight of this tier
    #[must_use]
    pub const fn weight(self) -> usize {
        match self {
            Self::High => 6,
            Self::Default => 3,
            Self::Low => 1,
        }
    }

    /// Maps a notification priority onto its queue tier
    #[must_use]
    pub const fn for_priority(priority: NotificationPriority) -> Self {
        match priority {
            NotificationPriority::Critical | NotificationPriority::High => Self::High,
            NotificationPriority::Normal => Self::Default,
            NotificationPriority::Low => Self::Low,
        }
    }

    /// One full polling round: each tier repeated by its weight
    #[must_use]
    pub fn weighted_schedule() -> Vec<Self> {
        let mut schedule = Vec::new();
        for tier in Self::ALL {
            schedule.extend(std::iter::repeat_n(tier, tier.weight()));
        }
        schedule
    }
}

/// The three delivery-task queues, one per tier
pub struct DeliveryQueues {
    high: SqsQueue<DeliveryTask>,
    default: SqsQueue<DeliveryTask>,
    low: SqsQueue<DeliveryTask>,
}

impl DeliveryQueues {
    /// Creates the queue fan from one SQS client and per-tier configs
    #[must_use]
    pub fn new(
        sqs_client: Arc<SqsClient>,
        high: QueueConfig,
        default: QueueConfig,
        low: QueueConfig,
    ) -> Self {
        Self {
            high: SqsQueue::new(Arc::clone(&sqs_client), high),
            default: SqsQueue::new(Arc::clone(&sqs_client), default),
            low: SqsQueue::new(sqs_client, low),
        }
    }

    /// Returns the queue backing a tier
    #[must_use]
    pub const fn tier(&self, tier: QueueTier) -> &SqsQueue<DeliveryTask> {
        match tier {
            QueueTier::High => &self.high,
            QueueTier::Default => &self.default,
            QueueTier::Low => &self.low,
        }
    }

    /// Returns the queue a notification priority enqueues into
    #[must_use]
    pub const fn for_priority(&self, priority: NotificationPriority) -> &SqsQueue<DeliveryTask> {
        self.tier(QueueTier::for_priority(priority))
    }

    /// Probes all three queues
    ///
    /// # Errors
    ///
    /// Returns `QueueError` for the first tier whose probe fails
    pub async fn health(&self) -> QueueResult<()> {
        self.high.health().await?;
        self.default.health().await?;
        self.low.health().await?;
        Ok(())
    }
}

/// Exponential retry delay with jitter for a redelivered task
///
/// Grows 5s, 10s, 20s, ... doubling per observed delivery, capped at ten
/// minutes, with up to 20% random jitter added so herds of failing tasks
/// spread out.
#[must_use]
pub fn retry_backoff_seconds(receive_count: u32) -> i32 {
    let exponent = receive_count.saturating_sub(1).min(7);
    let base = (BACKOFF_BASE_SECONDS << exponent).min(BACKOFF_CAP_SECONDS);
    let jitter = rand::thread_rng().gen_range(0..=base / 5);

    i32::try_from(base + jitter).unwrap_or(i32::MAX)
}
