//! Error types for device subscription storage operations

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::{
    delete_item::DeleteItemError, describe_table::DescribeTableError, get_item::GetItemError,
    put_item::PutItemError, query::QueryError, scan::ScanError, update_item::UpdateItemError,
};
use thiserror::Error;

/// Result type for device subscription storage operations
pub type DeviceSubscriptionStorageResult<T> = Result<T, DeviceSubscriptionStorageError>;

/// Errors that can occur during device subscription storage operations
#[derive(Error, Debug)]
pub enum DeviceSubscriptionStorageError {
    /// Failed to insert subscription into Dynamo DB
    #[error("Failed to insert device subscription into DynamoDB: {0}")]
    DynamoDbPutError(#[from] SdkError<PutItemError>),

    /// Failed to get subscription from Dynamo DB
    #[error("Failed to get device subscription from DynamoDB: {0}")]
    DynamoDbGetError(#[from] SdkError<GetItemError>),

    /// Failed to query subscriptions from Dynamo DB
    #[error("Failed to query device subscriptions from DynamoDB: {0}")]
    DynamoDbQueryError(#[from] SdkError<QueryError>),

    /// Failed to scan subscriptions from Dynamo DB
    #[error("Failed to scan device subscriptions from DynamoDB: {0}")]
    DynamoDbScanError(#[from] SdkError<ScanError>),

    /// Failed to update subscription in Dynamo DB
    #[error("Failed to update device subscription in DynamoDB: {0}")]
    DynamoDbUpdateError(#[from] SdkError<UpdateItemError>),

    /// Failed to delete subscription from Dynamo DB
    #[error("Failed to delete device subscription from DynamoDB: {0}")]
    DynamoDbDeleteError(#[from] SdkError<DeleteItemError>),

    /// Health probe against the table failed
    #[error("Failed to describe device subscription table: {0}")]
    DynamoDbDescribeError(#[from] SdkError<DescribeTableError>),

    /// A subscription with the same endpoint already exists
    #[error("Device subscription already exists")]
    SubscriptionExists,

    /// No subscription found for the given key
    #[error("Device subscription not found")]
    SubscriptionNotFound,

    /// Serialization error for `serde_dynamo`
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error for `serde_dynamo`
    #[error("Failed to parse device subscription item: {0}")]
    ParseSubscriptionError(String),
}
