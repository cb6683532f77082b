use std::time::Duration;

use crate::types::Environment;

/// Configuration for the delivery worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent task processors
    pub num_workers: usize,
    /// Redeliveries tolerated before a task is recorded as exhausted
    pub max_retries: u32,
    /// Deadline for one push HTTP exchange
    pub push_timeout: Duration,
    /// How long shutdown waits for in-flight handlers
    pub shutdown_grace: Duration,
}

impl WorkerConfig {
    /// Creates a `WorkerConfig` from the given environment
    #[must_use]
    pub fn from_environment(env: Environment) -> Self {
        Self {
            num_workers: env.num_workers(),
            max_retries: 3,
            push_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(30),
        }
    }

    /// Returns the task channel capacity (2 * `num_workers`)
    #[must_use]
    pub const fn channel_capacity(&self) -> usize {
        self.num_workers * 2
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_environment(Environment::from_env())
    }
}
