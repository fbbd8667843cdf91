//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use singletable_core::schema::Entity;
use singletable_core::storage::{
    CountPage, Item, PrimaryKey, PutCondition, QueryPage, QueryRequest, Result, StorageEngine,
    StorageError,
};

use crate::client::Client;
use crate::config::Config;
use crate::storage::InMemoryEngine;
use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub user_id: String,
    pub task_id: String,
    pub status: String,
    pub updated_at: u64,
    pub title: String,
    pub assignee: Option<String>,
}

impl Entity for Task {
    const FIELDS: &'static [&'static str] = &[
        "userId",
        "taskId",
        "status",
        "updatedAt",
        "title",
        "assignee",
    ];
}

pub fn task(user_id: &str, task_id: &str, status: &str, updated_at: u64) -> Task {
    Task {
        user_id: user_id.to_string(),
        task_id: task_id.to_string(),
        status: status.to_string(),
        updated_at,
        title: format!("Task {task_id}"),
        assignee: None,
    }
}

pub fn key(user_id: &str, task_id: &str) -> Value {
    json!({ "userId": user_id, "taskId": task_id })
}

pub fn config() -> Config {
    Config {
        table_name: "test".to_string(),
        endpoint_url: None,
        region: "us-east-1".to_string(),
        batch_concurrency: 1,
    }
}

pub fn client(engine: &InMemoryEngine) -> Client {
    Client::new(Arc::new(engine.clone()), &config())
}

/// Tasks keyed by user and task id, with a status index and a sparse
/// assignee index.
pub fn tasks(client: &Client) -> Table<Task> {
    client
        .table::<Task>("Task")
        .key(&["userId"], &["taskId"])
        .gsi1("byStatus", &["userId"], &["status", "updatedAt"])
        .gsi2("byAssignee", &["assignee"], &["updatedAt"])
        .build()
}

/// In-memory engine whose writes start failing once `healthy_writes` write
/// calls have gone through. Reads always delegate.
pub struct FaultyEngine {
    inner: InMemoryEngine,
    healthy_writes: AtomicUsize,
}

impl FaultyEngine {
    pub fn new(inner: InMemoryEngine, healthy_writes: usize) -> Self {
        Self {
            inner,
            healthy_writes: AtomicUsize::new(healthy_writes),
        }
    }

    fn write(&self, operation: &'static str) -> Result<()> {
        self.healthy_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .map(|_| ())
            .map_err(|_| StorageError::engine(operation, "service unavailable"))
    }
}

#[async_trait]
impl StorageEngine for FaultyEngine {
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        self.inner.query(request).await
    }

    async fn count(&self, request: &QueryRequest) -> Result<CountPage> {
        self.inner.count(request).await
    }

    async fn get(&self, table: &str, key: &PrimaryKey) -> Result<Option<Item>> {
        self.inner.get(table, key).await
    }

    async fn put(&self, table: &str, item: Item, condition: PutCondition) -> Result<()> {
        self.write("PutItem")?;
        self.inner.put(table, item, condition).await
    }

    async fn delete(&self, table: &str, key: &PrimaryKey) -> Result<()> {
        self.write("DeleteItem")?;
        self.inner.delete(table, key).await
    }

    async fn batch_get(&self, table: &str, keys: &[PrimaryKey]) -> Result<Vec<Item>> {
        self.inner.batch_get(table, keys).await
    }

    async fn batch_write(
        &self,
        table: &str,
        puts: Vec<Item>,
        deletes: Vec<PrimaryKey>,
    ) -> Result<()> {
        self.write("BatchWriteItem")?;
        self.inner.batch_write(table, puts, deletes).await
    }
}

/// Client over a [`FaultyEngine`] wrapping `engine`.
pub fn faulty_client(engine: &InMemoryEngine, healthy_writes: usize) -> Client {
    Client::new(
        Arc::new(FaultyEngine::new(engine.clone(), healthy_writes)),
        &config(),
    )
}
