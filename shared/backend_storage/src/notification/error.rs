//! Error types for notification storage operations

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::{
    describe_table::DescribeTableError, get_item::GetItemError, put_item::PutItemError,
    query::QueryError, transact_write_items::TransactWriteItemsError,
    update_item::UpdateItemError,
};
use thiserror::Error;

/// Result type for notification storage operations
pub type NotificationStorageResult<T> = Result<T, NotificationStorageError>;

/// Errors that can occur during notification storage operations
#[derive(Error, Debug)]
pub enum NotificationStorageError {
    /// Failed to insert notification into Dynamo DB
    #[error("Failed to insert notification into DynamoDB: {0}")]
    DynamoDbPutError(#[from] SdkError<PutItemError>),

    /// Failed to get notification from Dynamo DB
    #[error("Failed to get notification from DynamoDB: {0}")]
    DynamoDbGetError(#[from] SdkError<GetItemError>),

    /// Failed to query notifications from Dynamo DB
    #[error("Failed to query notifications from DynamoDB: {0}")]
    DynamoDbQueryError(#[from] SdkError<QueryError>),

    /// Failed to update notification in Dynamo DB
    #[error("Failed to update notification in DynamoDB: {0}")]
    DynamoDbUpdateError(#[from] SdkError<UpdateItemError>),

    /// Failed to run the guarded notification write transaction
    #[error("Failed to transact notification write: {0}")]
    DynamoDbTransactError(#[from] SdkError<TransactWriteItemsError>),

    /// Health probe against the table failed
    #[error("Failed to describe notification table: {0}")]
    DynamoDbDescribeError(#[from] SdkError<DescribeTableError>),

    /// Failed to assemble a transact item
    #[error("Failed to build transact item: {0}")]
    TransactBuildError(String),

    /// A notification with this idempotency key already exists
    #[error("Notification idempotency key already exists")]
    IdempotencyKeyExists,

    /// A notification with this id already exists
    #[error("Notification already exists")]
    NotificationExists,

    /// No notification found for the given key
    #[error("Notification not found")]
    NotificationNotFound,

    /// Serialization error for `serde_dynamo`
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error for `serde_dynamo`
    #[error("Failed to parse notification item: {0}")]
    ParseNotificationError(String),
}
