//! Storage engine implementations.
//!
//! This module provides concrete implementations of the `StorageEngine`
//! trait defined in `singletable_core::storage`. The implementations are
//! selected at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-memory engine for tests and local development
//! - `dynamodb`: AWS DynamoDB engine using `aws-sdk-dynamodb`
//!
//! Both engines can be enabled at once.
//!
//! # Examples
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p singletable --features dynamodb
//! ```

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub use inmemory::{CallStats, InMemoryEngine};

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbEngine;
