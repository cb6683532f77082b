//! Web Push sending
//!
//! One operation: VAPID-sign and ECE-encrypt a payload, POST it to the
//! subscription's vendor endpoint, and hand back the raw outcome. The
//! request is built with the `web-push` crate and sent with the shared
//! `reqwest` client so the vendor's HTTP status stays observable for
//! classification.

pub mod payload;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use web_push::{
    ContentEncoding, SubscriptionInfo, Urgency, VapidSignatureBuilder, WebPushMessageBuilder,
    URL_SAFE_NO_PAD,
};

use backend_storage::device_subscription::DeviceSubscription;

/// Raw outcome of one vendor call that produced an HTTP response
#[derive(Debug, Clone)]
pub struct PushResponse {
    /// Vendor HTTP status
    pub http_status: u16,
    /// Response body when the vendor sent a non-empty one
    pub body: Option<String>,
    /// Wall-clock duration of the HTTP exchange
    pub elapsed: Duration,
}

/// Failures that never produced a vendor HTTP status
#[derive(Error, Debug)]
pub enum PushSendError {
    /// The subscription's key material or endpoint cannot form a message;
    /// retrying can never succeed
    #[error("failed to build push message: {0}")]
    MessageBuild(String),

    /// The request never completed; a retry may succeed
    #[error("push transport failure: {0}")]
    Transport(String),

    /// The vendor did not answer within the attempt deadline
    #[error("push request timed out after {0:?}")]
    Timeout(Duration),
}

impl PushSendError {
    /// Whether a later retry of the same send could succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// The one seam the delivery worker needs from the Web Push protocol
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Sends `payload` to the subscription's endpoint
    ///
    /// # Errors
    ///
    /// Returns `PushSendError` when no vendor HTTP status was obtained
    async fn send(
        &self,
        subscription: &DeviceSubscription,
        payload: &[u8],
        ttl_seconds: u32,
        urgency: Urgency,
    ) -> Result<PushResponse, PushSendError>;
}

/// Production `PushSender` speaking the Web Push protocol
pub struct WebPushSender {
    http_client: reqwest::Client,
    vapid_private_key: String,
    timeout: Duration,
}

impl WebPushSender {
    /// Creates a sender from a base64url VAPID private key
    #[must_use]
    pub fn new(vapid_private_key: String, timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            vapid_private_key,
            timeout,
        }
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &DeviceSubscription,
        payload: &[u8],
        ttl_seconds: u32,
        urgency: Urgency,
    ) -> Result<PushResponse, PushSendError> {
        let subscription_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.p256dh,
            &subscription.auth,
        );

        let signature = VapidSignatureBuilder::from_base64(
            &self.vapid_private_key,
            URL_SAFE_NO_PAD,
            &subscription_info,
        )
        .map_err(|e| PushSendError::MessageBuild(e.to_string()))?
        .build()
        .map_err(|e| PushSendError::MessageBuild(e.to_string()))?;

        let mut builder = WebPushMessageBuilder::new(&subscription_info);
        builder.set_ttl(ttl_seconds);
        builder.set_urgency(urgency);
        builder.set_vapid_signature(signature);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);

        let message = builder
            .build()
            .map_err(|e| PushSendError::MessageBuild(e.to_string()))?;

        // Assemble the HTTP request from the built WebPushMessage
        let started = Instant::now();
        let mut request = self
            .http_client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl);

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(encrypted) = message.payload {
            request = request
                .header("Content-Encoding", encrypted.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (name, value) in &encrypted.crypto_headers {
                request = request.header(*name, value);
            }
            request = request.body(encrypted.content);
        }

        let response = request.timeout(self.timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                PushSendError::Timeout(self.timeout)
            } else {
                PushSendError::Transport(e.to_string())
            }
        })?;

        let http_status = response.status().as_u16();
        let body = response
            .text()
            .await
            .ok()
            .filter(|body| !body.is_empty());

        Ok(PushResponse {
            http_status,
            body,
            elapsed: started.elapsed(),
        })
    }
}
