//! Generic SQS queue implementation
//!
//! This module provides a generic queue implementation that can be used
//! with any message type that implements the required traits.

use crate::queue::{
    error::QueueResult,
    types::{MessageGroupId, QueueConfig, QueueMessage},
};
use aws_sdk_sqs::{
    types::{MessageSystemAttributeName, QueueAttributeName},
    Client as SqsClient,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Generic SQS queue for handling any message type
pub struct SqsQueue<T> {
    sqs_client: Arc<SqsClient>,
    config: QueueConfig,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> SqsQueue<T>
where
    T: Serialize + DeserializeOwned + MessageGroupId + Send + Sync,
{
    /// Creates a new generic SQS queue
    ///
    /// # Arguments
    ///
    /// * `sqs_client` - Pre-configured SQS client
    /// * `config` - Queue configuration including URL and default parameters
    #[must_use]
    pub const fn new(sqs_client: Arc<SqsClient>, config: QueueConfig) -> Self {
        Self {
            sqs_client,
            config,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Returns the queue URL this client targets
    #[must_use]
    pub fn queue_url(&self) -> &str {
        &self.config.queue_url
    }

    /// Sends a message to the queue
    ///
    /// # Arguments
    ///
    /// * `message` - The message to send
    ///
    /// # Returns
    ///
    /// The message ID if successful or an empty string
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the send operation fails
    pub async fn send_message(&self, message: &T) -> QueueResult<String> {
        // Serialize the message
        let body = serde_json::to_string(message)?;

        let mut request = self
            .sqs_client
            .send_message()
            .queue_url(&self.config.queue_url)
            .message_body(body)
            .message_group_id(message.message_group_id());

        if let Some(deduplication_id) = message.message_deduplication_id() {
            request = request.message_deduplication_id(deduplication_id);
        }

        let result = request.send().await?;

        Ok(result
            .message_id()
            .map(std::string::ToString::to_string)
            .unwrap_or_default())
    }

    /// Polls messages from the queue
    ///
    /// Requests the `ApproximateReceiveCount` system attribute so consumers
    /// can derive a retry counter. Undecodable bodies are poison: they are
    /// logged and deleted here, since redelivering them can never succeed.
    ///
    /// # Returns
    ///
    /// A vector of messages with metadata
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the poll operation fails
    pub async fn poll_messages(&self) -> QueueResult<Vec<QueueMessage<T>>> {
        // Receive messages from SQS
        let result = self
            .sqs_client
            .receive_message()
            .queue_url(&self.config.queue_url)
            .max_number_of_messages(self.config.default_max_messages)
            .visibility_timeout(self.config.default_visibility_timeout)
            .wait_time_seconds(self.config.default_wait_time_seconds)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await?;

        // Parse messages
        let mut messages = Vec::new();
        for msg in result.messages() {
            let (Some(body), Some(receipt_handle), Some(message_id)) =
                (msg.body(), msg.receipt_handle(), msg.message_id())
            else {
                continue;
            };

            let receive_count = msg
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|count| count.parse::<u32>().ok())
                .unwrap_or(1);

            match serde_json::from_str::<T>(body) {
                Ok(parsed) => messages.push(QueueMessage {
                    body: parsed,
                    receipt_handle: receipt_handle.to_string(),
                    message_id: message_id.to_string(),
                    receive_count,
                }),
                Err(e) => {
                    tracing::error!(message_id, "Dropping undecodable queue message: {}", e);
                    if let Err(ack_err) = self.ack_message(receipt_handle).await {
                        tracing::error!("Failed to drop poison message: {}", ack_err);
                    }
                }
            }
        }

        Ok(messages)
    }

    /// Acknowledges receipt of a message by deleting it from the queue
    ///
    /// # Arguments
    ///
    /// * `receipt_handle` - The receipt handle from the received message
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the acknowledgment fails
    pub async fn ack_message(&self, receipt_handle: &str) -> QueueResult<()> {
        self.sqs_client
            .delete_message()
            .queue_url(&self.config.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await?;

        Ok(())
    }

    /// Returns a message to the queue after `delay_seconds`
    ///
    /// Shrinking the visibility timeout hands the lease back early; the
    /// message reappears once the delay elapses and its
    /// `ApproximateReceiveCount` increases.
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the visibility change fails
    pub async fn nack_message(&self, receipt_handle: &str, delay_seconds: i32) -> QueueResult<()> {
        self.sqs_client
            .change_message_visibility()
            .queue_url(&self.config.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(delay_seconds)
            .send()
            .await?;

        Ok(())
    }

    /// Round-trip probe used by the health endpoints
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue attributes cannot be fetched
    pub async fn health(&self) -> QueueResult<()> {
        self.sqs_client
            .get_queue_attributes()
            .queue_url(&self.config.queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await?;

        Ok(())
    }
}
