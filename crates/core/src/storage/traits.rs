use async_trait::async_trait;

use super::{CountPage, Item, PrimaryKey, PutCondition, QueryPage, QueryRequest, Result};

/// DynamoDB's per-request item limit for BatchGetItem.
pub const DEFAULT_READ_BATCH_LIMIT: usize = 100;
/// DynamoDB's per-request item limit for BatchWriteItem.
pub const DEFAULT_WRITE_BATCH_LIMIT: usize = 25;

/// The key-value storage engine the data access layer runs against.
///
/// Implementations perform exactly one logical engine call per method and
/// never retry on behalf of the caller. Batch methods receive at most
/// [`read_batch_limit`](Self::read_batch_limit) /
/// [`write_batch_limit`](Self::write_batch_limit) entries; chunking above
/// that is the caller's job.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Maximum number of keys accepted by one `batch_get` call.
    fn read_batch_limit(&self) -> usize {
        DEFAULT_READ_BATCH_LIMIT
    }

    /// Maximum number of puts plus deletes accepted by one `batch_write` call.
    fn write_batch_limit(&self) -> usize {
        DEFAULT_WRITE_BATCH_LIMIT
    }

    /// Runs one page of a query.
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage>;

    /// Runs one page of a query, counting matches without returning them.
    async fn count(&self, request: &QueryRequest) -> Result<CountPage>;

    /// Reads a single item by primary key.
    async fn get(&self, table: &str, key: &PrimaryKey) -> Result<Option<Item>>;

    /// Writes a single item.
    ///
    /// Returns `StorageError::ConditionFailed` when `condition` does not hold.
    async fn put(&self, table: &str, item: Item, condition: PutCondition) -> Result<()>;

    /// Deletes a single item. Deleting a missing key succeeds.
    async fn delete(&self, table: &str, key: &PrimaryKey) -> Result<()>;

    /// Reads many items by primary key. Result order is unspecified and
    /// missing keys are simply absent.
    async fn batch_get(&self, table: &str, keys: &[PrimaryKey]) -> Result<Vec<Item>>;

    /// Writes and deletes many items. Not atomic as a unit.
    async fn batch_write(
        &self,
        table: &str,
        puts: Vec<Item>,
        deletes: Vec<PrimaryKey>,
    ) -> Result<()>;
}
