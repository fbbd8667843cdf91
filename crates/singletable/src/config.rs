use std::env;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Physical table every entity type shares (default: "singletable")
    pub table_name: String,
    /// Endpoint override, e.g. a local DynamoDB (default: none)
    pub endpoint_url: Option<String>,
    /// AWS region (default: "us-east-1")
    pub region: String,
    /// Batch chunks allowed in flight at once (default: 1)
    pub batch_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DYNAMODB_TABLE_NAME` - Table name (default: "singletable")
    /// - `AWS_ENDPOINT_URL` - Endpoint override (default: none)
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    /// - `BATCH_CONCURRENCY` - Concurrent batch chunks, at least 1 (default: 1)
    pub fn from_env() -> Self {
        Self {
            table_name: env::var("DYNAMODB_TABLE_NAME")
                .unwrap_or_else(|_| "singletable".to_string()),
            endpoint_url: env::var("AWS_ENDPOINT_URL").ok().filter(|v| !v.is_empty()),
            region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            batch_concurrency: env::var("BATCH_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1),
        }
    }

    /// Same configuration against another table.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Same configuration with another batch concurrency, clamped to at least 1.
    pub fn with_batch_concurrency(mut self, batch_concurrency: usize) -> Self {
        self.batch_concurrency = batch_concurrency.max(1);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
