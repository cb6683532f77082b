//! Queue operations for the push notification service
//!
//! This module provides functionality for interacting with AWS SQS FIFO
//! queues: the three priority-tiered delivery-task queues drained by the
//! delivery worker, and the generic queue plumbing underneath them.

/// Priority-tiered delivery task queues
pub mod delivery;
/// Error types for queue operations
pub mod error;
/// Generic SQS queue implementation
pub mod sqs_queue;
/// Common types for queue operations
pub mod types;

pub use delivery::{DeliveryQueues, QueueTier};
pub use error::{QueueError, QueueResult};
pub use sqs_queue::SqsQueue;
pub use types::{DeliveryTask, MessageGroupId, QueueConfig, QueueMessage};
