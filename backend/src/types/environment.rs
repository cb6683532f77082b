//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion};
use backend_storage::queue::{delivery::QueueTier, QueueConfig};

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

    /// Listen port of the producer API
    #[must_use]
    pub fn port(self) -> u16 {
        env::var("PORT").map_or(8000, |p| p.parse().unwrap_or(8000))
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

    /// Dynamo DB table holding notification recipients
    #[must_use]
    pub fn recipients_table(self) -> String {
        self.required_var("RECIPIENTS_TABLE_NAME", "push-notification-recipients")
    }

    /// Dynamo DB table holding the delivery attempt ledger
    #[must_use]
    pub fn attempts_table(self) -> String {
        self.required_var("ATTEMPTS_TABLE_NAME", "push-delivery-attempts")
    }

    /// Queue configuration for one delivery tier
    ///
    /// The visibility timeout doubles as the per-attempt task timeout for
    /// the worker; the producer only ever sends.
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
            default_wait_time_seconds: 20,
        }
    }

    /// Shared secret for producer request signing
    #[must_use]
    pub fn hmac_secret(self) -> String {
        self.required_var("HMAC_SECRET", "dev-hmac-secret")
    }

    /// Base64url VAPID public key served to subscribers, if configured
    #[must_use]
    pub fn vapid_public_key(self) -> Option<String> {
        env::var("VAPID_PUBLIC_KEY").ok().filter(|key| !key.is_empty())
    }

    /// Origins allowed to call the API from a browser
    #[must_use]
    pub fn cors_allowed_origins(self) -> Vec<String> {
        env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Whether to show API docs
    #[must_use]
    pub const fn show_api_docs(self) -> bool {
        matches!(self, Self::Development | Self::Staging)
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
