//! Item codec.
//!
//! Converts between typed records and storage items: `encode` attaches the
//! derived key attributes, `decode` strips them again.

use serde_json::{Map, Value};

use crate::schema::{Entity, IndexId, TableSchema};
use crate::storage::{
    Item, Result, StorageError, PARTITION_KEY_ATTR, SORT_KEY_ATTR, TYPE_TAG_ATTR,
};

/// Serializes any value whose serde form is an object into a field map.
pub fn to_fields<V: serde::Serialize + ?Sized>(value: &V) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::Serialization(format!(
            "expected an object with named fields, got {other}"
        ))),
    }
}

/// Builds the storage item for `record`.
///
/// An index key pair is attached only when every field of that index is
/// present and non-null; otherwise both attributes are left out so the
/// engine omits the item from the index.
pub fn encode<T: Entity>(schema: &TableSchema, record: &T) -> Result<Item> {
    let fields = to_fields(record)?;
    Ok(encode_fields(schema, fields))
}

/// [`encode`] over an already serialized record.
pub fn encode_fields(schema: &TableSchema, fields: Map<String, Value>) -> Item {
    let mut item = fields;

    let key = schema.primary_key(&item);
    let index_keys: Vec<_> = schema
        .indexes()
        .filter(|index| index.is_populated_by(&item))
        .map(|index| (index.id, schema.index_key(index, &item)))
        .collect();

    item.insert(PARTITION_KEY_ATTR.to_string(), Value::String(key.partition_key));
    item.insert(SORT_KEY_ATTR.to_string(), Value::String(key.sort_key));
    item.insert(
        TYPE_TAG_ATTR.to_string(),
        Value::String(schema.type_name().to_string()),
    );
    for (id, (partition_key, sort_key)) in index_keys {
        item.insert(id.partition_key_attr().to_string(), Value::String(partition_key));
        item.insert(id.sort_key_attr().to_string(), Value::String(sort_key));
    }

    item
}

/// Strips the derived attributes from `item`, leaving the user fields.
///
/// Every index slot is stripped, declared or not, so items written under an
/// older schema decode cleanly after an index is dropped.
pub fn decode_fields(mut item: Item) -> Map<String, Value> {
    item.remove(PARTITION_KEY_ATTR);
    item.remove(SORT_KEY_ATTR);
    item.remove(TYPE_TAG_ATTR);
    for id in IndexId::ALL {
        item.remove(id.partition_key_attr());
        item.remove(id.sort_key_attr());
    }
    item
}

/// Rebuilds the typed record from a storage item.
pub fn decode<T: Entity>(schema: &TableSchema, item: Item) -> Result<T> {
    let fields = decode_fields(item);
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| StorageError::InvalidData(format!("{}: {}", schema.type_name(), e)))
}
