use backend_storage::queue::{delivery::QueueTier, DeliveryTask, QueueError, QueueMessage};
use thiserror::Error;

/// A dequeued delivery task tagged with the queue tier it came from
#[derive(Debug, Clone)]
pub struct TaskEnvelope {
    /// Tier whose queue holds the lease
    pub tier: QueueTier,
    /// The task plus its broker metadata
    pub message: QueueMessage<DeliveryTask>,
}

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that stop a worker component
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Queue operation failure
    #[error("queue failure: {0}")]
    Queue(#[from] QueueError),

    /// Health listener failure
    #[error("health server failure: {0}")]
    Health(#[from] std::io::Error),
}
