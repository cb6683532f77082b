//! Error types for notification recipient storage operations

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::{
    batch_write_item::BatchWriteItemError, put_item::PutItemError, query::QueryError,
};
use thiserror::Error;

/// Result type for notification recipient storage operations
pub type NotificationRecipientStorageResult<T> = Result<T, NotificationRecipientStorageError>;

/// Errors that can occur during notification recipient storage operations
#[derive(Error, Debug)]
pub enum NotificationRecipientStorageError {
    /// Failed to batch-write recipients into Dynamo DB
    #[error("Failed to batch-write notification recipients into DynamoDB: {0}")]
    DynamoDbBatchWriteError(#[from] SdkError<BatchWriteItemError>),

    /// Failed to insert a recipient into Dynamo DB
    #[error("Failed to insert notification recipient into DynamoDB: {0}")]
    DynamoDbPutError(#[from] SdkError<PutItemError>),

    /// Failed to query recipients from Dynamo DB
    #[error("Failed to query notification recipients from DynamoDB: {0}")]
    DynamoDbQueryError(#[from] SdkError<QueryError>),

    /// Batch write left unprocessed items after bounded retries
    #[error("Batch write left {0} unprocessed recipient items")]
    UnprocessedItems(usize),

    /// Failed to assemble a batch write request
    #[error("Failed to build batch write request: {0}")]
    BatchBuildError(String),

    /// Serialization error for `serde_dynamo`
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error for `serde_dynamo`
    #[error("Failed to parse notification recipient item: {0}")]
    ParseRecipientError(String),
}
