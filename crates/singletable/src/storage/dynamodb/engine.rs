//! DynamoDB storage engine.
//!
//! Implements `StorageEngine` from `singletable_core::storage` on top of
//! `aws-sdk-dynamodb`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::types::{DeleteRequest, KeysAndAttributes, PutRequest, Select, WriteRequest};
use aws_sdk_dynamodb::Client;
use tracing::{trace, warn};

use singletable_core::condition::FilterCondition;
use singletable_core::storage::{
    CountPage, Item, PrimaryKey, PutCondition, QueryPage, QueryRequest, Result, StorageEngine,
    StorageError, PARTITION_KEY_ATTR, SORT_KEY_ATTR,
};

use super::conversions::{
    attributes_to_item, attributes_to_last_key, expression_names, expression_values,
    item_to_attributes, key_to_attributes, last_key_to_attributes,
};
use super::error::{
    map_batch_get_error, map_batch_write_error, map_build_error, map_delete_item_error,
    map_get_item_error, map_put_item_error, map_query_error,
};
use crate::config::Config;

/// Requests sent for one batch call before unprocessed entries become an error.
const MAX_BATCH_ATTEMPTS: u32 = 3;
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_millis(2000);

fn retry_delay(attempt: u32) -> Duration {
    INITIAL_RETRY_DELAY
        .saturating_mul(1 << attempt.min(16))
        .min(MAX_RETRY_DELAY)
}

/// DynamoDB-based storage engine.
///
/// The physical table is expected to use `partitionKey` / `sortKey` as its
/// primary key and to carry the indexes `gsi1` to `gsi5` keyed on
/// `gsiN_partitionKey` / `gsiN_sortKey`, all string attributes.
#[derive(Debug, Clone)]
pub struct DynamoDbEngine {
    client: Client,
}

impl DynamoDbEngine {
    /// Creates a new engine with the given DynamoDB client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a new engine from configuration.
    ///
    /// Uses the AWS SDK default credential chain, the configured region, and
    /// the endpoint override when one is set (for local DynamoDB).
    pub async fn from_config(config: &Config) -> Self {
        let mut sdk_config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint_url {
            sdk_config_loader = sdk_config_loader.endpoint_url(endpoint);
        }

        let sdk_config = sdk_config_loader.load().await;
        Self::new(Client::new(&sdk_config))
    }

    /// Get the underlying SDK client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn query_builder(&self, request: &QueryRequest) -> QueryFluentBuilder {
        let key = request.key_condition.to_expression();
        let filter = request.filter.as_ref().map(FilterCondition::to_expression);

        let mut names = expression_names(&key.names);
        let mut values = expression_values(&key.values);
        if let Some(filter) = &filter {
            names.extend(expression_names(&filter.names));
            values.extend(expression_values(&filter.values));
        }

        self.client
            .query()
            .table_name(&request.table_name)
            .set_index_name(request.index.map(|id| id.as_str().to_string()))
            .key_condition_expression(key.text)
            .set_filter_expression(filter.map(|filter| filter.text))
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .set_limit(
                request
                    .limit
                    .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX)),
            )
            .set_exclusive_start_key(request.start_key.as_ref().map(last_key_to_attributes))
            .scan_index_forward(request.scan_forward)
    }
}

#[async_trait]
impl StorageEngine for DynamoDbEngine {
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        trace!(
            table = %request.table_name,
            index = ?request.index,
            condition = %request.key_condition,
            "Query"
        );

        let output = self
            .query_builder(request)
            .send()
            .await
            .map_err(map_query_error)?;

        let items = output
            .items
            .unwrap_or_default()
            .iter()
            .map(attributes_to_item)
            .collect::<Result<Vec<_>>>()?;
        let last_key = output
            .last_evaluated_key
            .as_ref()
            .map(attributes_to_last_key)
            .transpose()?;

        Ok(QueryPage { items, last_key })
    }

    async fn count(&self, request: &QueryRequest) -> Result<CountPage> {
        trace!(
            table = %request.table_name,
            index = ?request.index,
            condition = %request.key_condition,
            "Count"
        );

        let output = self
            .query_builder(request)
            .select(Select::Count)
            .send()
            .await
            .map_err(map_query_error)?;

        let last_key = output
            .last_evaluated_key
            .as_ref()
            .map(attributes_to_last_key)
            .transpose()?;

        Ok(CountPage {
            count: usize::try_from(output.count).unwrap_or_default(),
            last_key,
        })
    }

    async fn get(&self, table: &str, key: &PrimaryKey) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key_to_attributes(key)))
            .send()
            .await
            .map_err(map_get_item_error)?;

        output.item.as_ref().map(attributes_to_item).transpose()
    }

    async fn put(&self, table: &str, item: Item, condition: PutCondition) -> Result<()> {
        let mut builder = self
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(item_to_attributes(&item)));

        if condition == PutCondition::NotExists {
            builder = builder
                .condition_expression("attribute_not_exists(#pk) AND attribute_not_exists(#sk)")
                .expression_attribute_names("#pk", PARTITION_KEY_ATTR)
                .expression_attribute_names("#sk", SORT_KEY_ATTR);
        }

        builder.send().await.map_err(map_put_item_error)?;
        Ok(())
    }

    async fn delete(&self, table: &str, key: &PrimaryKey) -> Result<()> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(key_to_attributes(key)))
            .send()
            .await
            .map_err(map_delete_item_error)?;
        Ok(())
    }

    async fn batch_get(&self, table: &str, keys: &[PrimaryKey]) -> Result<Vec<Item>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let request = KeysAndAttributes::builder()
            .set_keys(Some(keys.iter().map(key_to_attributes).collect()))
            .build()
            .map_err(map_build_error("BatchGetItem"))?;
        let mut pending = HashMap::from([(table.to_string(), request)]);
        let mut items = Vec::with_capacity(keys.len());
        let mut attempt = 0;

        loop {
            let output = self
                .client
                .batch_get_item()
                .set_request_items(Some(pending))
                .send()
                .await
                .map_err(map_batch_get_error)?;

            if let Some(found) = output.responses.and_then(|mut r| r.remove(table)) {
                for attributes in &found {
                    items.push(attributes_to_item(attributes)?);
                }
            }

            pending = output.unprocessed_keys.unwrap_or_default();
            pending.retain(|_, request| !request.keys().is_empty());
            if pending.is_empty() {
                return Ok(items);
            }

            attempt += 1;
            let remaining: usize = pending.values().map(|request| request.keys().len()).sum();
            if attempt >= MAX_BATCH_ATTEMPTS {
                return Err(StorageError::engine(
                    "BatchGetItem",
                    format!("{remaining} keys still unprocessed after {attempt} attempts"),
                ));
            }

            warn!(table, attempt, remaining, "Resubmitting unprocessed keys");
            tokio::time::sleep(retry_delay(attempt)).await;
        }
    }

    async fn batch_write(
        &self,
        table: &str,
        puts: Vec<Item>,
        deletes: Vec<PrimaryKey>,
    ) -> Result<()> {
        let mut requests = Vec::with_capacity(puts.len() + deletes.len());
        for item in &puts {
            let put = PutRequest::builder()
                .set_item(Some(item_to_attributes(item)))
                .build()
                .map_err(map_build_error("BatchWriteItem"))?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }
        for key in &deletes {
            let delete = DeleteRequest::builder()
                .set_key(Some(key_to_attributes(key)))
                .build()
                .map_err(map_build_error("BatchWriteItem"))?;
            requests.push(WriteRequest::builder().delete_request(delete).build());
        }
        if requests.is_empty() {
            return Ok(());
        }

        let mut pending = HashMap::from([(table.to_string(), requests)]);
        let mut attempt = 0;

        loop {
            let output = self
                .client
                .batch_write_item()
                .set_request_items(Some(pending))
                .send()
                .await
                .map_err(map_batch_write_error)?;

            pending = output.unprocessed_items.unwrap_or_default();
            pending.retain(|_, requests| !requests.is_empty());
            if pending.is_empty() {
                return Ok(());
            }

            attempt += 1;
            let remaining: usize = pending.values().map(Vec::len).sum();
            if attempt >= MAX_BATCH_ATTEMPTS {
                return Err(StorageError::engine(
                    "BatchWriteItem",
                    format!("{remaining} entries still unprocessed after {attempt} attempts"),
                ));
            }

            warn!(table, attempt, remaining, "Resubmitting unprocessed entries");
            tokio::time::sleep(retry_delay(attempt)).await;
        }
    }
}
