//! DynamoDB storage engine.
//!
//! This module provides a DynamoDB-based implementation of the storage
//! engine trait using `aws-sdk-dynamodb`.

mod conversions;
mod engine;
mod error;

pub use engine::DynamoDbEngine;
