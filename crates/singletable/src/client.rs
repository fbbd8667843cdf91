use std::fmt;
use std::sync::Arc;

use singletable_core::schema::Entity;
use singletable_core::storage::StorageEngine;

use crate::config::Config;
use crate::table::TableBuilder;

/// Handle to one physical table on one storage engine.
///
/// Cheap to clone; every [`Table`](crate::Table) built from it shares the
/// same engine. The application owns its lifetime.
#[derive(Clone)]
pub struct Client {
    engine: Arc<dyn StorageEngine>,
    table_name: Arc<str>,
    batch_concurrency: usize,
}

impl Client {
    /// Creates a client over `engine` with the table and batch settings of
    /// `config`.
    pub fn new(engine: Arc<dyn StorageEngine>, config: &Config) -> Self {
        Self {
            engine,
            table_name: Arc::from(config.table_name.as_str()),
            batch_concurrency: config.batch_concurrency.max(1),
        }
    }

    /// Creates a client over a fresh in-memory engine.
    #[cfg(feature = "inmemory")]
    pub fn in_memory(config: &Config) -> Self {
        Self::new(Arc::new(crate::storage::InMemoryEngine::new()), config)
    }

    /// Creates a client over DynamoDB.
    ///
    /// Uses the AWS SDK default credential chain with the region and
    /// endpoint from `config`.
    #[cfg(feature = "dynamodb")]
    pub async fn dynamodb(config: &Config) -> Self {
        let engine = crate::storage::DynamoDbEngine::from_config(config).await;
        tracing::debug!(
            table = %config.table_name,
            region = %config.region,
            endpoint = ?config.endpoint_url,
            "Created DynamoDB client"
        );
        Self::new(Arc::new(engine), config)
    }

    /// Starts declaring how records of type `T` are stored.
    ///
    /// ```
    /// use serde::{Deserialize, Serialize};
    /// use singletable::{Client, Config, Entity};
    ///
    /// #[derive(Serialize, Deserialize)]
    /// #[serde(rename_all = "camelCase")]
    /// struct Task {
    ///     user_id: String,
    ///     task_id: String,
    /// }
    ///
    /// impl Entity for Task {
    ///     const FIELDS: &'static [&'static str] = &["userId", "taskId"];
    /// }
    ///
    /// let client = Client::in_memory(&Config::from_env());
    /// let tasks = client
    ///     .table::<Task>("Task")
    ///     .key(&["userId"], &["taskId"])
    ///     .build();
    /// assert_eq!(tasks.schema().type_name(), "Task");
    /// ```
    pub fn table<T: Entity>(&self, type_name: impl Into<String>) -> TableBuilder<T> {
        TableBuilder::new(self.clone(), type_name)
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("table_name", &self.table_name)
            .field("batch_concurrency", &self.batch_concurrency)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            table_name: "tasks".to_string(),
            endpoint_url: None,
            region: "us-east-1".to_string(),
            batch_concurrency: 0,
        }
    }

    #[test]
    fn test_client_takes_settings_from_config() {
        let client = Client::in_memory(&config());

        assert_eq!(client.table_name(), "tasks");
        assert_eq!(client.batch_concurrency(), 1);
        assert_eq!(client.engine().write_batch_limit(), 25);
    }

    #[test]
    fn test_debug_omits_engine() {
        let client = Client::in_memory(&config());
        assert_eq!(
            format!("{client:?}"),
            r#"Client { table_name: "tasks", batch_concurrency: 1, .. }"#
        );
    }
}
