use thiserror::Error;

/// Boxed error returned by an engine call, kept intact as the error source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A conditional write lost: the item already exists.
    #[error("Condition check failed")]
    ConditionFailed,
    /// Any failure reported by the storage engine, propagated unchanged.
    #[error("{operation} failed: {source}")]
    Engine {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Unknown index: {0}")]
    UnknownIndex(String),
}

impl StorageError {
    /// Wraps an engine failure for the named operation.
    pub fn engine(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Engine {
            operation,
            source: source.into(),
        }
    }

    /// Returns true when this is a lost conditional write.
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::ConditionFailed)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
