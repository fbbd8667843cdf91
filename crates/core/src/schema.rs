//! Table schema declaration.
//!
//! A [`TableSchema`] fixes, once and for all, how a record type maps onto the
//! single table: its type name, the ordered partition-key and sort-key
//! fields, and up to five secondary indexes. Misuse panics while the schema
//! is being declared, never at query time.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::keys::{encode_partition_key, encode_sort_key};
use crate::storage::PrimaryKey;

/// A record type that can be stored in the table.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Field names as they appear in the serialized record.
    const FIELDS: &'static [&'static str];
}

/// Identifier of one of the five secondary index slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexId {
    Gsi1,
    Gsi2,
    Gsi3,
    Gsi4,
    Gsi5,
}

impl IndexId {
    pub const ALL: [IndexId; 5] = [
        IndexId::Gsi1,
        IndexId::Gsi2,
        IndexId::Gsi3,
        IndexId::Gsi4,
        IndexId::Gsi5,
    ];

    /// The index name as known to the storage engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexId::Gsi1 => "gsi1",
            IndexId::Gsi2 => "gsi2",
            IndexId::Gsi3 => "gsi3",
            IndexId::Gsi4 => "gsi4",
            IndexId::Gsi5 => "gsi5",
        }
    }

    /// Attribute holding this index's partition key (`gsiN_partitionKey`).
    pub fn partition_key_attr(&self) -> &'static str {
        match self {
            IndexId::Gsi1 => "gsi1_partitionKey",
            IndexId::Gsi2 => "gsi2_partitionKey",
            IndexId::Gsi3 => "gsi3_partitionKey",
            IndexId::Gsi4 => "gsi4_partitionKey",
            IndexId::Gsi5 => "gsi5_partitionKey",
        }
    }

    /// Attribute holding this index's sort key (`gsiN_sortKey`).
    pub fn sort_key_attr(&self) -> &'static str {
        match self {
            IndexId::Gsi1 => "gsi1_sortKey",
            IndexId::Gsi2 => "gsi2_sortKey",
            IndexId::Gsi3 => "gsi3_sortKey",
            IndexId::Gsi4 => "gsi4_sortKey",
            IndexId::Gsi5 => "gsi5_sortKey",
        }
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: String,
    pub id: IndexId,
    pub partition_key_fields: Vec<String>,
    pub sort_key_fields: Vec<String>,
}

impl IndexSchema {
    /// Every field the index key is built from.
    pub fn key_fields(&self) -> impl Iterator<Item = &str> {
        self.partition_key_fields
            .iter()
            .chain(self.sort_key_fields.iter())
            .map(String::as_str)
    }

    /// True when every index key field is present and non-null.
    pub fn is_populated_by(&self, values: &Map<String, Value>) -> bool {
        self.key_fields()
            .all(|field| values.get(field).is_some_and(|value| !value.is_null()))
    }
}

/// Immutable description of how a record type is keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    type_name: String,
    partition_key_fields: Vec<String>,
    sort_key_fields: Vec<String>,
    indexes: BTreeMap<IndexId, IndexSchema>,
}

impl TableSchema {
    /// Starts declaring a schema for `T`.
    pub fn builder<T: Entity>(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(type_name, T::FIELDS)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn partition_key_fields(&self) -> &[String] {
        &self.partition_key_fields
    }

    pub fn sort_key_fields(&self) -> &[String] {
        &self.sort_key_fields
    }

    /// Declared indexes in slot order.
    pub fn indexes(&self) -> impl Iterator<Item = &IndexSchema> {
        self.indexes.values()
    }

    /// Looks up an index by its declared name.
    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.values().find(|index| index.name == name)
    }

    /// Encodes the partition key from `values`.
    pub fn partition_key(&self, values: &Map<String, Value>) -> String {
        encode_partition_key(&self.type_name, &self.partition_key_fields, values)
    }

    /// Encodes the (possibly partial) sort key from `values`.
    pub fn sort_key(&self, values: &Map<String, Value>) -> String {
        encode_sort_key(&self.type_name, &self.sort_key_fields, values)
    }

    /// Encodes the composed primary key from `values`.
    pub fn primary_key(&self, values: &Map<String, Value>) -> PrimaryKey {
        PrimaryKey::new(self.partition_key(values), self.sort_key(values))
    }

    /// Encodes an index's key pair from `values`.
    pub fn index_key(&self, index: &IndexSchema, values: &Map<String, Value>) -> (String, String) {
        (
            encode_partition_key(&self.type_name, &index.partition_key_fields, values),
            encode_sort_key(&self.type_name, &index.sort_key_fields, values),
        )
    }
}

/// Fluent builder for [`TableSchema`].
///
/// Key fields default to empty when [`key`](Self::key) is never called, which
/// collapses every record of the type onto a single logical item.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    type_name: String,
    known_fields: &'static [&'static str],
    partition_key_fields: Vec<String>,
    sort_key_fields: Vec<String>,
    indexes: BTreeMap<IndexId, IndexSchema>,
}

impl SchemaBuilder {
    /// Creates a builder for a record type exposing `known_fields`.
    pub fn new(type_name: impl Into<String>, known_fields: &'static [&'static str]) -> Self {
        Self {
            type_name: type_name.into(),
            known_fields,
            partition_key_fields: Vec::new(),
            sort_key_fields: Vec::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Declares the primary key fields, in order.
    ///
    /// # Panics
    ///
    /// Panics if a field is not part of the record type.
    pub fn key(mut self, partition_fields: &[&str], sort_fields: &[&str]) -> Self {
        self.partition_key_fields = self.checked_fields(partition_fields);
        self.sort_key_fields = self.checked_fields(sort_fields);
        self
    }

    /// Registers a secondary index in the given slot, replacing any index
    /// previously registered there.
    ///
    /// # Panics
    ///
    /// Panics if a field is not part of the record type, or if another slot
    /// already uses `name`.
    pub fn index(
        mut self,
        id: IndexId,
        name: impl Into<String>,
        partition_fields: &[&str],
        sort_fields: &[&str],
    ) -> Self {
        let name = name.into();
        if let Some(other) = self
            .indexes
            .values()
            .find(|index| index.name == name && index.id != id)
        {
            panic!(
                "{}: index name '{}' is already registered on {}",
                self.type_name, name, other.id
            );
        }

        let index = IndexSchema {
            name,
            id,
            partition_key_fields: self.checked_fields(partition_fields),
            sort_key_fields: self.checked_fields(sort_fields),
        };
        self.indexes.insert(id, index);
        self
    }

    pub fn gsi1(self, name: impl Into<String>, partition: &[&str], sort: &[&str]) -> Self {
        self.index(IndexId::Gsi1, name, partition, sort)
    }

    pub fn gsi2(self, name: impl Into<String>, partition: &[&str], sort: &[&str]) -> Self {
        self.index(IndexId::Gsi2, name, partition, sort)
    }

    pub fn gsi3(self, name: impl Into<String>, partition: &[&str], sort: &[&str]) -> Self {
        self.index(IndexId::Gsi3, name, partition, sort)
    }

    pub fn gsi4(self, name: impl Into<String>, partition: &[&str], sort: &[&str]) -> Self {
        self.index(IndexId::Gsi4, name, partition, sort)
    }

    pub fn gsi5(self, name: impl Into<String>, partition: &[&str], sort: &[&str]) -> Self {
        self.index(IndexId::Gsi5, name, partition, sort)
    }

    /// Freezes the declaration.
    pub fn build(self) -> TableSchema {
        TableSchema {
            type_name: self.type_name,
            partition_key_fields: self.partition_key_fields,
            sort_key_fields: self.sort_key_fields,
            indexes: self.indexes,
        }
    }

    fn checked_fields(&self, fields: &[&str]) -> Vec<String> {
        fields
            .iter()
            .map(|field| {
                assert!(
                    self.known_fields.contains(field),
                    "{}: '{}' is not a field of the record type",
                    self.type_name,
                    field
                );
                field.to_string()
            })
            .collect()
    }
}
