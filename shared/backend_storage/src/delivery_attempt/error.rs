//! Error types for delivery attempt storage operations

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::{
    put_item::PutItemError, query::QueryError, scan::ScanError,
};
use thiserror::Error;

/// Result type for delivery attempt storage operations
pub type DeliveryAttemptStorageResult<T> = Result<T, DeliveryAttemptStorageError>;

/// Errors that can occur during delivery attempt storage operations
#[derive(Error, Debug)]
pub enum DeliveryAttemptStorageError {
    /// Failed to insert attempt into Dynamo DB
    #[error("Failed to insert delivery attempt into DynamoDB: {0}")]
    DynamoDbPutError(#[from] SdkError<PutItemError>),

    /// Failed to query attempts from Dynamo DB
    #[error("Failed to query delivery attempts from DynamoDB: {0}")]
    DynamoDbQueryError(#[from] SdkError<QueryError>),

    /// Failed to scan attempts from Dynamo DB
    #[error("Failed to scan delivery attempts from DynamoDB: {0}")]
    DynamoDbScanError(#[from] SdkError<ScanError>),

    /// Serialization error for `serde_dynamo`
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error for `serde_dynamo`
    #[error("Failed to parse delivery attempt item: {0}")]
    ParseAttemptError(String),
}
