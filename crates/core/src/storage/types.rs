use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::{FilterCondition, KeyCondition};
use crate::schema::IndexId;

/// Attribute holding the encoded partition key.
pub const PARTITION_KEY_ATTR: &str = "partitionKey";
/// Attribute holding the encoded sort key.
pub const SORT_KEY_ATTR: &str = "sortKey";
/// Attribute holding the record's type name.
pub const TYPE_TAG_ATTR: &str = "typeTag";

/// A storage-ready record: user fields plus derived key attributes.
pub type Item = Map<String, Value>;

/// Key attributes of the last item evaluated by a query page.
pub type LastKey = BTreeMap<String, String>;

/// The composed primary key of a stored item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub partition_key: String,
    pub sort_key: String,
}

impl PrimaryKey {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }

    /// Reads the primary key attributes of a stored item.
    pub fn from_item(item: &Item) -> Option<Self> {
        let partition_key = item.get(PARTITION_KEY_ATTR)?.as_str()?;
        let sort_key = item.get(SORT_KEY_ATTR)?.as_str()?;
        Some(Self::new(partition_key, sort_key))
    }

    /// The key as a last-evaluated-key map.
    pub fn to_last_key(&self) -> LastKey {
        LastKey::from([
            (PARTITION_KEY_ATTR.to_string(), self.partition_key.clone()),
            (SORT_KEY_ATTR.to_string(), self.sort_key.clone()),
        ])
    }
}

/// Write condition for a single-item put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutCondition {
    #[default]
    None,
    /// Both key attributes must be absent on the stored item.
    NotExists,
}

/// A compiled query, ready to hand to a storage engine.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table_name: String,
    pub index: Option<IndexId>,
    pub key_condition: KeyCondition,
    pub filter: Option<FilterCondition>,
    pub limit: Option<u32>,
    pub start_key: Option<LastKey>,
    /// `false` returns items in descending sort-key order.
    pub scan_forward: bool,
}

impl QueryRequest {
    /// A copy of this request resuming after `start_key`.
    pub fn resume_from(&self, start_key: Option<LastKey>) -> Self {
        Self {
            start_key,
            ..self.clone()
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    pub last_key: Option<LastKey>,
}

/// One page of a count query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountPage {
    pub count: usize,
    pub last_key: Option<LastKey>,
}
