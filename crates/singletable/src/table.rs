//! Typed table handles.
//!
//! A [`Table`] binds a frozen [`TableSchema`] to a [`Client`] and exposes the
//! single-item and batch operations for one record type. Keys are passed as
//! any serializable value whose object form carries the key fields; a record
//! is a valid key for itself.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use singletable_core::codec::{decode, encode_fields, to_fields};
use singletable_core::schema::{Entity, IndexSchema, SchemaBuilder, TableSchema};
use singletable_core::storage::{
    Item, PrimaryKey, PutCondition, Result, StorageEngine, StorageError,
};

use crate::batch::{dedup_items, dedup_keys, for_each_chunk};
use crate::client::Client;
use crate::query::Query;

/// Declares how records of type `T` map onto the table.
pub struct TableBuilder<T> {
    client: Client,
    schema: SchemaBuilder,
    marker: PhantomData<fn() -> T>,
}

impl<T: Entity> TableBuilder<T> {
    pub(crate) fn new(client: Client, type_name: impl Into<String>) -> Self {
        Self {
            client,
            schema: TableSchema::builder::<T>(type_name),
            marker: PhantomData,
        }
    }

    /// Declares the ordered partition-key and sort-key fields.
    ///
    /// Without it every record of the type shares one empty key.
    pub fn key(self, partition: &[&str], sort: &[&str]) -> Self {
        self.map(|schema| schema.key(partition, sort))
    }

    pub fn gsi1(self, name: impl Into<String>, partition: &[&str], sort: &[&str]) -> Self {
        self.map(|schema| schema.gsi1(name, partition, sort))
    }

    pub fn gsi2(self, name: impl Into<String>, partition: &[&str], sort: &[&str]) -> Self {
        self.map(|schema| schema.gsi2(name, partition, sort))
    }

    pub fn gsi3(self, name: impl Into<String>, partition: &[&str], sort: &[&str]) -> Self {
        self.map(|schema| schema.gsi3(name, partition, sort))
    }

    pub fn gsi4(self, name: impl Into<String>, partition: &[&str], sort: &[&str]) -> Self {
        self.map(|schema| schema.gsi4(name, partition, sort))
    }

    pub fn gsi5(self, name: impl Into<String>, partition: &[&str], sort: &[&str]) -> Self {
        self.map(|schema| schema.gsi5(name, partition, sort))
    }

    /// Freezes the schema and returns the table handle.
    pub fn build(self) -> Table<T> {
        let schema = self.schema.build();
        debug!(
            table = %self.client.table_name(),
            type_name = %schema.type_name(),
            indexes = schema.indexes().count(),
            "Declared table schema"
        );

        Table {
            inner: Arc::new(TableInner {
                client: self.client,
                schema,
            }),
            marker: PhantomData,
        }
    }

    fn map(mut self, f: impl FnOnce(SchemaBuilder) -> SchemaBuilder) -> Self {
        self.schema = f(self.schema);
        self
    }
}

struct TableInner {
    client: Client,
    schema: TableSchema,
}

/// CRUD and query surface for one record type.
///
/// Cheap to clone; clones share the schema.
pub struct Table<T> {
    inner: Arc<TableInner>,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("table_name", &self.inner.client.table_name())
            .field("schema", &self.inner.schema)
            .finish()
    }
}

impl<T: Entity> Table<T> {
    pub fn schema(&self) -> &TableSchema {
        &self.inner.schema
    }

    pub(crate) fn client(&self) -> &Client {
        &self.inner.client
    }

    fn engine(&self) -> &dyn StorageEngine {
        self.inner.client.engine().as_ref()
    }

    fn table_name(&self) -> &str {
        self.inner.client.table_name()
    }

    fn type_name(&self) -> &str {
        self.inner.schema.type_name()
    }

    /// Starts a query on the primary key for the partition named by
    /// `partition`'s fields.
    pub fn query<K: Serialize + ?Sized>(&self, partition: &K) -> Result<Query<T>> {
        Ok(Query::new(self.clone(), None, to_fields(partition)?))
    }

    /// Looks up a declared secondary index by name.
    pub fn index(&self, name: &str) -> Result<IndexQuery<T>> {
        let index = self
            .schema()
            .index(name)
            .ok_or_else(|| StorageError::UnknownIndex(name.to_string()))?;

        Ok(IndexQuery {
            table: self.clone(),
            index: index.clone(),
        })
    }

    /// Reads the record stored under `key`, if any.
    pub async fn get<K: Serialize + ?Sized>(&self, key: &K) -> Result<Option<T>> {
        let key = self.primary_key(key)?;
        trace!(
            table = %self.table_name(),
            type_name = %self.type_name(),
            partition_key = %key.partition_key,
            sort_key = %key.sort_key,
            "Get"
        );

        self.engine()
            .get(self.table_name(), &key)
            .await?
            .map(|item| decode(self.schema(), item))
            .transpose()
    }

    /// Writes `record`, replacing any record stored under the same key.
    pub async fn put(&self, record: T) -> Result<T> {
        let (key, item) = self.encode(&record)?;
        debug!(
            table = %self.table_name(),
            type_name = %self.type_name(),
            partition_key = %key.partition_key,
            sort_key = %key.sort_key,
            "Put"
        );

        self.engine()
            .put(self.table_name(), item, PutCondition::None)
            .await?;
        Ok(record)
    }

    /// Writes `record` only if nothing is stored under its key.
    ///
    /// Returns `false` when the key is taken; any other failure is an error.
    pub async fn put_if_not_exists(&self, record: &T) -> Result<bool> {
        let (key, item) = self.encode(record)?;

        match self
            .engine()
            .put(self.table_name(), item, PutCondition::NotExists)
            .await
        {
            Ok(()) => {
                debug!(
                    table = %self.table_name(),
                    partition_key = %key.partition_key,
                    sort_key = %key.sort_key,
                    "Put if not exists: created"
                );
                Ok(true)
            }
            Err(StorageError::ConditionFailed) => {
                debug!(
                    table = %self.table_name(),
                    partition_key = %key.partition_key,
                    sort_key = %key.sort_key,
                    "Put if not exists: key taken"
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes the record stored under `key`. Deleting a missing key succeeds.
    pub async fn delete<K: Serialize + ?Sized>(&self, key: &K) -> Result<()> {
        let key = self.primary_key(key)?;
        debug!(
            table = %self.table_name(),
            partition_key = %key.partition_key,
            sort_key = %key.sort_key,
            "Delete"
        );

        self.engine().delete(self.table_name(), &key).await
    }

    /// Reads many records by key.
    ///
    /// Results follow the order of `keys`. Repeated keys yield one record and
    /// missing keys are left out.
    pub async fn batch_get<K: Serialize>(&self, keys: &[K]) -> Result<Vec<T>> {
        let keys = keys
            .iter()
            .map(|key| self.primary_key(key))
            .collect::<Result<Vec<_>>>()?;
        let keys = dedup_keys(keys);
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let engine = self.engine();
        let table = self.table_name();
        let pages = for_each_chunk(
            keys.clone(),
            engine.read_batch_limit(),
            self.client().batch_concurrency(),
            |chunk| async move { engine.batch_get(table, &chunk).await },
        )
        .await?;

        let mut found: HashMap<PrimaryKey, Item> = pages
            .into_iter()
            .flatten()
            .filter_map(|item| PrimaryKey::from_item(&item).map(|key| (key, item)))
            .collect();
        trace!(
            table,
            type_name = %self.type_name(),
            requested = keys.len(),
            found = found.len(),
            "Batch get"
        );

        keys.iter()
            .filter_map(|key| found.remove(key))
            .map(|item| decode(self.schema(), item))
            .collect()
    }

    /// Writes many records. Not atomic: chunks written before a failing
    /// chunk stay written.
    pub async fn batch_put(&self, records: &[T]) -> Result<()> {
        let items = records
            .iter()
            .map(|record| self.encode(record))
            .collect::<Result<Vec<_>>>()?;
        let items = dedup_items(items);
        if items.is_empty() {
            return Ok(());
        }

        let engine = self.engine();
        let table = self.table_name();
        let limit = engine.write_batch_limit();
        debug!(
            table,
            type_name = %self.type_name(),
            items = items.len(),
            chunks = items.len().div_ceil(limit),
            "Batch put"
        );

        for_each_chunk(
            items,
            limit,
            self.client().batch_concurrency(),
            |chunk| async move { engine.batch_write(table, chunk, Vec::new()).await },
        )
        .await?;
        Ok(())
    }

    /// Deletes many records by key. Not atomic.
    pub async fn batch_delete<K: Serialize>(&self, keys: &[K]) -> Result<()> {
        let keys = keys
            .iter()
            .map(|key| self.primary_key(key))
            .collect::<Result<Vec<_>>>()?;
        let keys = dedup_keys(keys);
        if keys.is_empty() {
            return Ok(());
        }

        let engine = self.engine();
        let table = self.table_name();
        let limit = engine.write_batch_limit();
        debug!(
            table,
            type_name = %self.type_name(),
            keys = keys.len(),
            chunks = keys.len().div_ceil(limit),
            "Batch delete"
        );

        for_each_chunk(
            keys,
            limit,
            self.client().batch_concurrency(),
            |chunk| async move { engine.batch_write(table, Vec::new(), chunk).await },
        )
        .await?;
        Ok(())
    }

    fn primary_key<K: Serialize + ?Sized>(&self, key: &K) -> Result<PrimaryKey> {
        Ok(self.schema().primary_key(&to_fields(key)?))
    }

    fn encode(&self, record: &T) -> Result<(PrimaryKey, Item)> {
        let fields = to_fields(record)?;
        let key = self.schema().primary_key(&fields);
        Ok((key, encode_fields(self.schema(), fields)))
    }
}

/// Query entry point for one secondary index.
pub struct IndexQuery<T> {
    table: Table<T>,
    index: IndexSchema,
}

impl<T> Clone for IndexQuery<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            index: self.index.clone(),
        }
    }
}

impl<T> fmt::Debug for IndexQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexQuery")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl<T: Entity> IndexQuery<T> {
    pub fn schema(&self) -> &IndexSchema {
        &self.index
    }

    /// Starts a query on this index for the partition named by
    /// `partition`'s fields.
    pub fn query<K: Serialize + ?Sized>(&self, partition: &K) -> Result<Query<T>> {
        Ok(Query::new(
            self.table.clone(),
            Some(self.index.id),
            to_fields(partition)?,
        ))
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use serde_json::json;
    use singletable_core::storage::{PARTITION_KEY_ATTR, SORT_KEY_ATTR};

    use super::*;
    use crate::storage::InMemoryEngine;
    use crate::testing::{client, config, faulty_client, key, task, tasks, Task};

    #[tokio::test]
    async fn test_put_then_get() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&client(&engine));
        let record = task("u1", "t1", "open", 1000);

        let stored = tasks.put(record.clone()).await.unwrap();
        assert_eq!(stored, record);
        assert_eq!(tasks.get(&key("u1", "t1")).await.unwrap(), Some(record.clone()));
        assert_eq!(tasks.get(&record).await.unwrap(), Some(record));
        assert_eq!(tasks.get(&key("u1", "missing")).await.unwrap(), None);

        let items = engine.items("test").await;
        assert_eq!(items[0][PARTITION_KEY_ATTR], json!("Task#userId#u1"));
        assert_eq!(items[0][SORT_KEY_ATTR], json!("taskId#t1"));
    }

    #[tokio::test]
    async fn test_put_if_not_exists() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&client(&engine));
        let first = task("u1", "t1", "open", 1000);
        let second = task("u1", "t1", "done", 2000);

        assert!(tasks.put_if_not_exists(&first).await.unwrap());
        assert!(!tasks.put_if_not_exists(&second).await.unwrap());
        assert_eq!(tasks.get(&key("u1", "t1")).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_put_if_not_exists_propagates_engine_errors() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&faulty_client(&engine, 0));

        let result = tasks.put_if_not_exists(&task("u1", "t1", "open", 1000)).await;

        assert!(matches!(
            result,
            Err(StorageError::Engine {
                operation: "PutItem",
                ..
            })
        ));
        assert!(engine.is_empty("test").await);
    }

    #[tokio::test]
    async fn test_crud_errors_propagate_unchanged() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&faulty_client(&engine, 0));

        assert!(matches!(
            tasks.put(task("u1", "t1", "open", 1000)).await,
            Err(StorageError::Engine {
                operation: "PutItem",
                ..
            })
        ));
        assert!(matches!(
            tasks.delete(&key("u1", "t1")).await,
            Err(StorageError::Engine {
                operation: "DeleteItem",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_batch_put_fails_when_a_chunk_fails() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&faulty_client(&engine, 1));
        let records: Vec<Task> = (0..60)
            .map(|i| task("u1", &format!("t{i:02}"), "open", i))
            .collect();

        let result = tasks.batch_put(&records).await;

        assert!(matches!(
            result,
            Err(StorageError::Engine {
                operation: "BatchWriteItem",
                ..
            })
        ));
        // The first chunk went through before the failure and is not rolled back.
        assert_eq!(engine.len("test").await, 25);
        assert_eq!(engine.calls().batch_write, 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&client(&engine));
        tasks.put(task("u1", "t1", "open", 1000)).await.unwrap();

        tasks.delete(&key("u1", "t1")).await.unwrap();
        tasks.delete(&key("u1", "t1")).await.unwrap();
        assert_eq!(tasks.get(&key("u1", "t1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_get_orders_dedups_and_omits_misses() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&client(&engine));
        for id in ["a", "b", "c"] {
            tasks.put(task("u1", id, "open", 1)).await.unwrap();
        }

        let found = tasks
            .batch_get(&[
                key("u1", "c"),
                key("u1", "a"),
                key("u1", "missing"),
                key("u1", "c"),
                key("u1", "b"),
            ])
            .await
            .unwrap();

        let ids: Vec<&str> = found.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(engine.calls().batch_get, 1);
    }

    #[tokio::test]
    async fn test_batch_get_chunks_to_read_limit() {
        let engine = InMemoryEngine::with_batch_limits(2, 25);
        let tasks = tasks(&client(&engine));
        let records: Vec<Task> = (0..5)
            .map(|i| task("u1", &format!("t{i}"), "open", i))
            .collect();
        tasks.batch_put(&records).await.unwrap();

        let keys: Vec<_> = records.iter().rev().collect();
        let found = tasks.batch_get(&keys).await.unwrap();

        assert_eq!(found, records.into_iter().rev().collect::<Vec<_>>());
        assert_eq!(engine.calls().batch_get, 3);
    }

    #[tokio::test]
    async fn test_batch_put_splits_at_write_limit() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&client(&engine));
        let records: Vec<Task> = (0..30)
            .map(|i| task("u1", &format!("t{i:02}"), "open", i))
            .collect();

        tasks.batch_put(&records).await.unwrap();

        assert_eq!(engine.calls().batch_write, 2);
        assert_eq!(engine.len("test").await, 30);
        for record in &records {
            assert_eq!(tasks.get(record).await.unwrap().as_ref(), Some(record));
        }
    }

    #[tokio::test]
    async fn test_batch_put_last_write_wins() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&client(&engine));

        tasks
            .batch_put(&[
                task("u1", "t1", "open", 1),
                task("u1", "t2", "open", 1),
                task("u1", "t1", "done", 2),
            ])
            .await
            .unwrap();

        assert_eq!(engine.len("test").await, 2);
        let stored = tasks.get(&key("u1", "t1")).await.unwrap().unwrap();
        assert_eq!(stored.status, "done");
    }

    #[tokio::test]
    async fn test_empty_batches_issue_no_calls() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&client(&engine));

        assert!(tasks.batch_get::<Task>(&[]).await.unwrap().is_empty());
        tasks.batch_put(&[]).await.unwrap();
        tasks.batch_delete::<Task>(&[]).await.unwrap();

        assert_eq!(engine.calls(), Default::default());
    }

    #[tokio::test]
    async fn test_batch_delete() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&client(&engine));
        let records: Vec<Task> = (0..27)
            .map(|i| task("u1", &format!("t{i:02}"), "open", i))
            .collect();
        tasks.batch_put(&records).await.unwrap();

        tasks.batch_delete(&records[..26]).await.unwrap();

        assert_eq!(engine.calls().batch_write, 4);
        assert_eq!(engine.items("test").await.len(), 1);
        assert_eq!(tasks.get(&records[26]).await.unwrap().as_ref(), Some(&records[26]));
    }

    #[tokio::test]
    async fn test_batch_chunks_run_concurrently() {
        let engine = InMemoryEngine::new();
        let client = Client::new(
            Arc::new(engine.clone()),
            &config().with_batch_concurrency(4),
        );
        let tasks = tasks(&client);
        let records: Vec<Task> = (0..100)
            .map(|i| task("u1", &format!("t{i:03}"), "open", i))
            .collect();

        tasks.batch_put(&records).await.unwrap();

        assert_eq!(engine.calls().batch_write, 4);
        assert_eq!(tasks.batch_get(&records).await.unwrap(), records);
    }

    #[tokio::test]
    async fn test_index_lookup() {
        let engine = InMemoryEngine::new();
        let tasks = tasks(&client(&engine));

        assert_eq!(tasks.index("byStatus").unwrap().schema().id.as_str(), "gsi1");
        assert!(matches!(
            tasks.index("byColor"),
            Err(StorageError::UnknownIndex(name)) if name == "byColor"
        ));
    }

    #[test]
    #[should_panic(expected = "is not a field of the record type")]
    fn test_unknown_key_field_panics() {
        let engine = InMemoryEngine::new();
        client(&engine)
            .table::<Task>("Task")
            .key(&["userId"], &["color"])
            .build();
    }
}
