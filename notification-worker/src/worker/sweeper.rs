//! Stale-subscription sweeper
//!
//! Hard-deletes subscriptions that were deactivated and untouched for the
//! retention window. Hygiene only: delivery correctness never depends on
//! this running.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use backend_storage::device_subscription::DeviceSubscriptionStorage;

/// How often the sweep runs
const SWEEP_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Inactive subscriptions untouched this many days get deleted
const RETENTION_DAYS: i64 = 30;

/// Periodic hard-delete of long-inactive subscriptions
pub struct StaleSubscriptionSweeper {
    subscriptions: Arc<DeviceSubscriptionStorage>,
    shutdown_token: CancellationToken,
}

impl StaleSubscriptionSweeper {
    /// Creates a new sweeper
    #[must_use]
    pub fn new(
        subscriptions: Arc<DeviceSubscriptionStorage>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            subscriptions,
            shutdown_token,
        }
    }

    /// Runs the sweep loop until shutdown
    pub async fn run(self) {
        info!(
            "Stale subscription sweeper started (every {:?}, retention {} days)",
            SWEEP_INTERVAL, RETENTION_DAYS
        );

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => break,
                () = tokio::time::sleep(SWEEP_INTERVAL) => self.sweep().await,
            }
        }

        info!("Stale subscription sweeper stopped");
    }

    async fn sweep(&self) {
        let cutoff = Utc::now() - chrono::Duration::days(RETENTION_DAYS);

        let stale = match self.subscriptions.find_stale(cutoff).await {
            Ok(stale) => stale,
            Err(err) => {
                error!("Stale subscription scan failed: {err}");
                return;
            }
        };

        if stale.is_empty() {
            return;
        }

        let mut deleted = 0u64;
        for subscription in &stale {
            match self.subscriptions.delete(&subscription.endpoint).await {
                Ok(()) => deleted += 1,
                Err(err) => {
                    error!(
                        subscription_id = %subscription.id,
                        "Failed to delete stale subscription: {err}"
                    );
                }
            }
        }

        metrics::counter!("subscriptions_swept_total").increment(deleted);
        info!(deleted, candidates = stale.len(), "Stale subscription sweep finished");
    }
}
