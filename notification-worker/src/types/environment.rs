//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion};
use backend_storage::queue::{delivery::QueueTier, QueueConfig};

/// Development-only VAPID private key (the P-256 scalar `1`); real
/// deployments always set `VAPID_PRIVATE_KEY`
const DEV_VAPID_PRIVATE_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAE";

/// Application environment configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Reads a variable that must be set outside development
    ///
    /// # Panics
    ///
    /// Panics in production/staging if the variable is missing
    fn required_var(self, name: &str, dev_default: &str) -> String {
        match self {
            Self::Production | Self::Staging => env::var(name)
                .unwrap_or_else(|_| panic!("{name} environment variable is not set")),
            Self::Development => env::var(name).unwrap_or_else(|_| dev_default.to_string()),
        }
    }

    /// Listen port of the worker health endpoint
    #[must_use]
    pub fn port(self) -> u16 {
        env::var("PORT").map_or(8001, |p| p.parse().unwrap_or(8001))
    }

    /// Number of concurrent task processors
    #[must_use]
    pub fn num_workers(self) -> usize {
        env::var("NUM_WORKERS").map_or(10, |n| n.parse().unwrap_or(10))
    }

    /// Dynamo DB table holding device subscriptions
    #[must_use]
    pub fn subscriptions_table(self) -> String {
        self.required_var("SUBSCRIPTIONS_TABLE_NAME", "push-device-subscriptions")
    }

    /// Dynamo DB table holding notifications and idempotency guards
    #[must_use]
    pub fn notifications_table(self) -> String {
        self.required_var("NOTIFICATIONS_TABLE_NAME", "push-notifications")
    }

    /// Dynamo DB table holding the delivery attempt ledger
    #[must_use]
    pub fn attempts_table(self) -> String {
        self.required_var("ATTEMPTS_TABLE_NAME", "push-delivery-attempts")
    }

    /// Queue configuration for one delivery tier
    ///
    /// Short long-poll waits keep the weighted round-robin responsive; the
    /// visibility timeout is the per-attempt task lease.
    #[must_use]
    pub fn delivery_queue_config(self, tier: QueueTier) -> QueueConfig {
        let (var, dev_default) = match tier {
            QueueTier::High => (
                "DELIVERY_QUEUE_HIGH_URL",
                "http://localhost:4566/000000000000/push-delivery-high.fifo",
            ),
            QueueTier::Default => (
                "DELIVERY_QUEUE_DEFAULT_URL",
                "http://localhost:4566/000000000000/push-delivery-default.fifo",
            ),
            QueueTier::Low => (
                "DELIVERY_QUEUE_LOW_URL",
                "http://localhost:4566/000000000000/push-delivery-low.fifo",
            ),
        };

        QueueConfig {
            queue_url: self.required_var(var, dev_default),
            default_max_messages: 10,
            default_visibility_timeout: 30,
            default_wait_time_seconds: 2,
        }
    }

    /// Base64url VAPID private key used to sign push assertions
    #[must_use]
    pub fn vapid_private_key(self) -> String {
        self.required_var("VAPID_PRIVATE_KEY", DEV_VAPID_PRIVATE_KEY)
    }

    /// Returns the endpoint URL to use for AWS services
    #[must_use]
    pub const fn override_aws_endpoint_url(self) -> Option<&'static str> {
        match self {
            // Regular AWS endpoints for production and staging
            Self::Production | Self::Staging => None,
            // LocalStack endpoint for development
            Self::Development => Some("http://localhost:4566"),
        }
    }

    /// AWS configuration with retry and timeout settings
    pub async fn aws_config(self) -> aws_config::SdkConfig {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let mut config_builder = aws_config::load_defaults(BehaviorVersion::latest())
            .await
            .to_builder()
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = self.override_aws_endpoint_url() {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        config_builder.build()
    }
}
