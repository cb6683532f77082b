//! Durable state and task-queue integration for the push notification service
//!
//! This crate provides the storage layer shared between the producer API and the
//! delivery worker: device subscriptions, notifications, recipients, the delivery
//! attempt ledger (all Dynamo DB) and the SQS delivery-task queues.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

pub mod delivery_attempt;
pub mod device_subscription;
pub mod notification;
pub mod notification_recipient;
pub mod queue;
