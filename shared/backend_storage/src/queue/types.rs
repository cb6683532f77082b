use serde::{Deserialize, Serialize};

/// One unit of delivery work: push one notification to one subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryTask {
    /// Notification to deliver
    pub notification_id: String,
    /// Recipient user id
    pub user_id: String,
    /// Target device subscription
    pub subscription_id: String,
}

/// Wrapper for queue messages with metadata
#[derive(Debug, Clone)]
pub struct QueueMessage<T> {
    /// The message body
    pub body: T,
    /// Receipt handle for acknowledging the message
    pub receipt_handle: String,
    /// Message ID
    pub message_id: String,
    /// How many times this message has been received, first delivery included
    pub receive_count: u32,
}

/// Configuration for queue operations
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue URL
    pub queue_url: String,
    /// Default maximum number of messages to retrieve
    pub default_max_messages: i32,
    /// Default visibility timeout for messages (in seconds)
    ///
    /// Doubles as the per-attempt task timeout: a handler that exceeds it
    /// loses its lease and the task is redelivered.
    pub default_visibility_timeout: i32,
    /// Default wait time for long polling
    pub default_wait_time_seconds: i32,
}

/// Trait for extracting FIFO routing metadata from queue messages
pub trait MessageGroupId {
    /// Returns the message group ID for FIFO queue ordering
    fn message_group_id(&self) -> String;

    /// Returns the deduplication ID suppressing duplicate enqueues
    /// within the FIFO deduplication window
    fn message_deduplication_id(&self) -> Option<String> {
        None
    }
}

impl MessageGroupId for DeliveryTask {
    /// Group by subscription: at most one task per subscription is in
    /// flight per dequeue, and retries stay ordered per endpoint.
    fn message_group_id(&self) -> String {
        self.subscription_id.clone()
    }

    fn message_deduplication_id(&self) -> Option<String> {
        Some(format!("{}:{}", self.notification_id, self.subscription_id))
    }
}
