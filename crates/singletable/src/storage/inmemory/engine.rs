//! In-memory storage engine.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use singletable_core::condition::KeyCondition;
use singletable_core::storage::{
    CountPage, Item, LastKey, PrimaryKey, PutCondition, QueryPage, QueryRequest, Result,
    StorageEngine, StorageError, DEFAULT_READ_BATCH_LIMIT, DEFAULT_WRITE_BATCH_LIMIT,
    PARTITION_KEY_ATTR, SORT_KEY_ATTR,
};

use super::eval::matches_filter;

type Table = BTreeMap<PrimaryKey, Item>;

#[derive(Debug, Default)]
struct CallCounters {
    query: AtomicUsize,
    count: AtomicUsize,
    get: AtomicUsize,
    put: AtomicUsize,
    delete: AtomicUsize,
    batch_get: AtomicUsize,
    batch_write: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, AtomicOrdering::SeqCst);
}

/// Snapshot of the engine calls issued so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub query: usize,
    pub count: usize,
    pub get: usize,
    pub put: usize,
    pub delete: usize,
    pub batch_get: usize,
    pub batch_write: usize,
}

impl CallStats {
    /// Calls that read: query, count, get and batch get.
    pub fn reads(&self) -> usize {
        self.query + self.count + self.get + self.batch_get
    }

    /// Calls that write: put, delete and batch write.
    pub fn writes(&self) -> usize {
        self.put + self.delete + self.batch_write
    }
}

/// In-memory storage engine for tests and local development.
///
/// Emulates the engine contract: sparse secondary indexes, byte-wise sort
/// key ordering, limits applied before the post-filter, and the per-call
/// batch limits. Tables are created on first write. Data is not persisted
/// and is shared between clones.
#[derive(Debug, Clone)]
pub struct InMemoryEngine {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    read_batch_limit: usize,
    write_batch_limit: usize,
    calls: Arc<CallCounters>,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    /// Creates an empty engine with the default batch limits.
    pub fn new() -> Self {
        Self::with_batch_limits(DEFAULT_READ_BATCH_LIMIT, DEFAULT_WRITE_BATCH_LIMIT)
    }

    /// Creates an empty engine accepting at most `read` keys per batch get
    /// and `write` entries per batch write.
    pub fn with_batch_limits(read: usize, write: usize) -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            read_batch_limit: read.max(1),
            write_batch_limit: write.max(1),
            calls: Arc::new(CallCounters::default()),
        }
    }

    /// Engine calls issued so far, across clones.
    pub fn calls(&self) -> CallStats {
        let load = |counter: &AtomicUsize| counter.load(AtomicOrdering::SeqCst);
        CallStats {
            query: load(&self.calls.query),
            count: load(&self.calls.count),
            get: load(&self.calls.get),
            put: load(&self.calls.put),
            delete: load(&self.calls.delete),
            batch_get: load(&self.calls.batch_get),
            batch_write: load(&self.calls.batch_write),
        }
    }

    /// Number of items stored in `table`.
    pub async fn len(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, Table::len)
    }

    /// Returns true when `table` holds no items.
    pub async fn is_empty(&self, table: &str) -> bool {
        self.len(table).await == 0
    }

    /// A copy of every item in `table`, in primary key order.
    pub async fn items(&self, table: &str) -> Vec<Item> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }
}

fn item_key(item: &Item) -> Result<PrimaryKey> {
    PrimaryKey::from_item(item).ok_or_else(|| {
        StorageError::InvalidData(format!(
            "item is missing '{PARTITION_KEY_ATTR}' or '{SORT_KEY_ATTR}'"
        ))
    })
}

fn reject_duplicates<'a>(
    operation: &'static str,
    keys: impl IntoIterator<Item = &'a PrimaryKey>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(StorageError::engine(
                operation,
                format!("duplicate key in batch: {key:?}"),
            ));
        }
    }
    Ok(())
}

/// Position of the start key in the (sort attribute, primary key) order.
fn start_position(start_key: &LastKey, sort_attr: &str) -> Result<(String, PrimaryKey)> {
    let attr = |name: &str| {
        start_key
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::InvalidCursor(format!("start key is missing '{name}'")))
    };
    Ok((
        attr(sort_attr)?,
        PrimaryKey::new(attr(PARTITION_KEY_ATTR)?, attr(SORT_KEY_ATTR)?),
    ))
}

fn last_key_of(key: &PrimaryKey, item: &Item, condition: &KeyCondition) -> LastKey {
    let mut last_key = key.to_last_key();
    for attr in [condition.partition_attr, condition.sort_attr] {
        if let Some(value) = item.get(attr).and_then(|v| v.as_str()) {
            last_key.insert(attr.to_string(), value.to_string());
        }
    }
    last_key
}

/// Evaluates the key condition, start key and limit of a request.
///
/// Returns the items that passed the post-filter and the last evaluated
/// key when the limit cut the result short.
fn evaluate<'a>(
    table: &'a Table,
    request: &QueryRequest,
) -> Result<(Vec<&'a Item>, Option<LastKey>)> {
    let condition = &request.key_condition;

    // Items without the queried key attributes are not in the index.
    let mut matches: Vec<(&str, &PrimaryKey, &Item)> = table
        .iter()
        .filter_map(|(key, item)| {
            let partition = item.get(condition.partition_attr)?.as_str()?;
            let sort = item.get(condition.sort_attr)?.as_str()?;
            let in_range = condition.sort.as_ref().is_none_or(|s| s.matches(sort));
            (partition == condition.partition_key && in_range).then_some((sort, key, item))
        })
        .collect();

    matches.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    if !request.scan_forward {
        matches.reverse();
    }

    if let Some(start_key) = &request.start_key {
        let (start_sort, start_key) = start_position(start_key, condition.sort_attr)?;
        let wanted = if request.scan_forward {
            Ordering::Greater
        } else {
            Ordering::Less
        };
        matches.retain(|(sort, key, _)| {
            (*sort, *key).cmp(&(start_sort.as_str(), &start_key)) == wanted
        });
    }

    let limit = request.limit.map_or(matches.len(), |limit| limit as usize);
    let truncated = matches.len() > limit;
    matches.truncate(limit);

    let last_key = if truncated {
        matches
            .last()
            .map(|(_, key, item)| last_key_of(key, item, condition))
    } else {
        None
    };

    let items = matches
        .into_iter()
        .map(|(_, _, item)| item)
        .filter(|item| {
            request
                .filter
                .as_ref()
                .is_none_or(|filter| matches_filter(filter, item))
        })
        .collect();

    Ok((items, last_key))
}

#[async_trait]
impl StorageEngine for InMemoryEngine {
    fn read_batch_limit(&self) -> usize {
        self.read_batch_limit
    }

    fn write_batch_limit(&self) -> usize {
        self.write_batch_limit
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        bump(&self.calls.query);
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&request.table_name) else {
            return Ok(QueryPage::default());
        };

        let (items, last_key) = evaluate(table, request)?;
        Ok(QueryPage {
            items: items.into_iter().cloned().collect(),
            last_key,
        })
    }

    async fn count(&self, request: &QueryRequest) -> Result<CountPage> {
        bump(&self.calls.count);
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&request.table_name) else {
            return Ok(CountPage::default());
        };

        let (items, last_key) = evaluate(table, request)?;
        Ok(CountPage {
            count: items.len(),
            last_key,
        })
    }

    async fn get(&self, table: &str, key: &PrimaryKey) -> Result<Option<Item>> {
        bump(&self.calls.get);
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|items| items.get(key)).cloned())
    }

    async fn put(&self, table: &str, item: Item, condition: PutCondition) -> Result<()> {
        bump(&self.calls.put);
        let key = item_key(&item)?;
        let mut tables = self.tables.write().await;
        let items = tables.entry(table.to_string()).or_default();

        if condition == PutCondition::NotExists && items.contains_key(&key) {
            return Err(StorageError::ConditionFailed);
        }

        items.insert(key, item);
        Ok(())
    }

    async fn delete(&self, table: &str, key: &PrimaryKey) -> Result<()> {
        bump(&self.calls.delete);
        let mut tables = self.tables.write().await;
        if let Some(items) = tables.get_mut(table) {
            items.remove(key);
        }
        Ok(())
    }

    async fn batch_get(&self, table: &str, keys: &[PrimaryKey]) -> Result<Vec<Item>> {
        bump(&self.calls.batch_get);
        if keys.len() > self.read_batch_limit {
            return Err(StorageError::engine(
                "BatchGetItem",
                format!(
                    "{} keys exceed the limit of {}",
                    keys.len(),
                    self.read_batch_limit
                ),
            ));
        }
        reject_duplicates("BatchGetItem", keys)?;

        let tables = self.tables.read().await;
        let Some(items) = tables.get(table) else {
            return Ok(Vec::new());
        };

        // Results come back in primary key order, not request order.
        let mut found: Vec<Item> = keys
            .iter()
            .filter_map(|key| items.get(key))
            .cloned()
            .collect();
        found.sort_by(|a, b| PrimaryKey::from_item(a).cmp(&PrimaryKey::from_item(b)));
        Ok(found)
    }

    async fn batch_write(
        &self,
        table: &str,
        puts: Vec<Item>,
        deletes: Vec<PrimaryKey>,
    ) -> Result<()> {
        bump(&self.calls.batch_write);
        let entries = puts.len() + deletes.len();
        if entries > self.write_batch_limit {
            return Err(StorageError::engine(
                "BatchWriteItem",
                format!(
                    "{entries} entries exceed the limit of {}",
                    self.write_batch_limit
                ),
            ));
        }

        let put_keys = puts.iter().map(item_key).collect::<Result<Vec<_>>>()?;
        reject_duplicates("BatchWriteItem", put_keys.iter().chain(deletes.iter()))?;

        let mut tables = self.tables.write().await;
        let items = tables.entry(table.to_string()).or_default();
        for (key, item) in put_keys.into_iter().zip(puts) {
            items.insert(key, item);
        }
        for key in &deletes {
            items.remove(key);
        }
        Ok(())
    }
}
