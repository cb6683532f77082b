//! Delivery worker components
//!
//! A weighted queue poller, a pool of task processors, and the coordinator
//! tying their lifecycles together.

pub mod config;
pub mod coordinator;
pub mod poller;
pub mod processor;
pub mod sweeper;
pub mod types;

pub use config::WorkerConfig;
pub use coordinator::{Coordinator, WorkerDependencies};
pub use processor::{classify_push, Disposition, PushOutcome, TaskProcessor};
pub use sweeper::StaleSubscriptionSweeper;
pub use types::{TaskEnvelope, WorkerError, WorkerResult};
