//! The JSON document emitted to the subscriber
//!
//! Optional fields are omitted when absent on the notification; `data` is
//! forwarded as the opaque object the producer supplied.

use serde::Serialize;
use web_push::Urgency;

use backend_storage::notification::{Notification, NotificationPriority};

/// Push TTL used when the producer set none
pub const DEFAULT_TTL_SECONDS: u32 = 3600;

/// Wire form of one push message
#[derive(Debug, Serialize)]
pub struct PushPayload<'a> {
    /// Originating notification id
    pub notification_id: &'a str,
    /// Producer-defined tag
    #[serde(rename = "type")]
    pub notification_type: &'a str,
    /// Display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    /// Display body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    /// Icon URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'a str>,
    /// Click-through URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
    /// BCP-47 locale tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<&'a str>,
    /// Opaque producer payload
    pub data: &'a serde_json::Value,
}

impl<'a> From<&'a Notification> for PushPayload<'a> {
    fn from(notification: &'a Notification) -> Self {
        Self {
            notification_id: &notification.id,
            notification_type: &notification.notification_type,
            title: notification.title.as_deref(),
            body: notification.body.as_deref(),
            icon: notification.icon.as_deref(),
            url: notification.url.as_deref(),
            locale: notification.locale.as_deref(),
            data: &notification.data,
        }
    }
}

/// Serializes the push payload for one notification
///
/// # Errors
///
/// Returns `serde_json::Error` if serialization fails
pub fn payload_bytes(notification: &Notification) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&PushPayload::from(notification))
}

/// Maps a notification priority onto the Web Push `Urgency` header
#[must_use]
pub const fn urgency_for_priority(priority: NotificationPriority) -> Urgency {
    match priority {
        NotificationPriority::Critical | NotificationPriority::High => Urgency::High,
        NotificationPriority::Normal => Urgency::Normal,
        NotificationPriority::Low => Urgency::Low,
    }
}
