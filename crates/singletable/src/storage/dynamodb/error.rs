//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StorageError` from `singletable_core::storage`.
//! Service errors are kept intact as the error source; only a lost
//! conditional write gets its own variant.

use std::error::Error as StdError;
use std::fmt::Debug;

use aws_sdk_dynamodb::error::{BuildError, SdkError};
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use singletable_core::storage::StorageError;

/// Connection-level failures never reached the service.
fn connection_error<E, R>(err: &SdkError<E, R>) -> Option<StorageError> {
    match err {
        SdkError::DispatchFailure(failure) => Some(StorageError::ConnectionFailed(format!(
            "{failure:?}"
        ))),
        SdkError::TimeoutError(_) => {
            Some(StorageError::ConnectionFailed("Request timed out".to_string()))
        }
        _ => None,
    }
}

fn service_error<E>(operation: &'static str, err: E, throttled: bool) -> StorageError
where
    E: StdError + Send + Sync + 'static,
{
    if throttled {
        tracing::warn!(operation, "DynamoDB throughput exceeded");
    }
    StorageError::engine(operation, err)
}

/// Map a Query SDK error to StorageError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> StorageError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    let err = err.into_service_error();
    let throttled = matches!(
        err,
        QueryError::ProvisionedThroughputExceededException(_) | QueryError::RequestLimitExceeded(_)
    );
    service_error("Query", err, throttled)
}

/// Map a GetItem SDK error to StorageError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> StorageError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    let err = err.into_service_error();
    let throttled = matches!(
        err,
        GetItemError::ProvisionedThroughputExceededException(_)
            | GetItemError::RequestLimitExceeded(_)
    );
    service_error("GetItem", err, throttled)
}

/// Map a PutItem SDK error to StorageError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
) -> StorageError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => StorageError::ConditionFailed,
        err => {
            let throttled = matches!(
                err,
                PutItemError::ProvisionedThroughputExceededException(_)
                    | PutItemError::RequestLimitExceeded(_)
            );
            service_error("PutItem", err, throttled)
        }
    }
}

/// Map a DeleteItem SDK error to StorageError.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
) -> StorageError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    let err = err.into_service_error();
    let throttled = matches!(
        err,
        DeleteItemError::ProvisionedThroughputExceededException(_)
            | DeleteItemError::RequestLimitExceeded(_)
    );
    service_error("DeleteItem", err, throttled)
}

/// Map a BatchGetItem SDK error to StorageError.
pub fn map_batch_get_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchGetItemError, R>,
) -> StorageError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    let err = err.into_service_error();
    let throttled = matches!(
        err,
        BatchGetItemError::ProvisionedThroughputExceededException(_)
            | BatchGetItemError::RequestLimitExceeded(_)
    );
    service_error("BatchGetItem", err, throttled)
}

/// Map a BatchWriteItem SDK error to StorageError.
pub fn map_batch_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchWriteItemError, R>,
) -> StorageError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    let err = err.into_service_error();
    let throttled = matches!(
        err,
        BatchWriteItemError::ProvisionedThroughputExceededException(_)
            | BatchWriteItemError::RequestLimitExceeded(_)
    );
    service_error("BatchWriteItem", err, throttled)
}

/// Map a request builder error to StorageError.
pub fn map_build_error(operation: &'static str) -> impl FnOnce(BuildError) -> StorageError {
    move |err| StorageError::engine(operation, err)
}
