//! DynamoDB attribute conversion functions.
//!
//! Pure functions converting between JSON items and DynamoDB attribute maps.
//! These are testable in isolation without DynamoDB access.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Number, Value};

use singletable_core::storage::{
    Item, LastKey, PrimaryKey, Result, StorageError, PARTITION_KEY_ATTR, SORT_KEY_ATTR,
};

/// Convert a JSON value to an attribute value.
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), to_attribute(value)))
                .collect(),
        ),
    }
}

/// Convert an attribute value back to JSON.
///
/// String and number sets come back as arrays. Binary attributes are never
/// written by this crate and are rejected.
pub fn from_attribute(attr: &AttributeValue) -> Result<Value> {
    let value = match attr {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => parse_number(n)?,
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| parse_number(n))
                .collect::<Result<_>>()?,
        ),
        AttributeValue::L(values) => {
            Value::Array(values.iter().map(from_attribute).collect::<Result<_>>()?)
        }
        AttributeValue::M(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| Ok((name.clone(), from_attribute(value)?)))
                .collect::<Result<_>>()?,
        ),
        other => {
            return Err(StorageError::InvalidData(format!(
                "Unsupported attribute value: {other:?}"
            )))
        }
    };
    Ok(value)
}

fn parse_number(n: &str) -> Result<Value> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(Value::from(u));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| StorageError::InvalidData(format!("Invalid number: {n}")))
}

/// Convert an item to a DynamoDB attribute map.
pub fn item_to_attributes(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute(value)))
        .collect()
}

/// Convert a DynamoDB attribute map to an item.
pub fn attributes_to_item(attributes: &HashMap<String, AttributeValue>) -> Result<Item> {
    attributes
        .iter()
        .map(|(name, value)| Ok((name.clone(), from_attribute(value)?)))
        .collect()
}

/// Convert a primary key to the key attribute map of GetItem and friends.
pub fn key_to_attributes(key: &PrimaryKey) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            PARTITION_KEY_ATTR.to_string(),
            AttributeValue::S(key.partition_key.clone()),
        ),
        (
            SORT_KEY_ATTR.to_string(),
            AttributeValue::S(key.sort_key.clone()),
        ),
    ])
}

/// Convert a last evaluated key to an exclusive start key.
pub fn last_key_to_attributes(last_key: &LastKey) -> HashMap<String, AttributeValue> {
    last_key
        .iter()
        .map(|(name, value)| (name.clone(), AttributeValue::S(value.clone())))
        .collect()
}

/// Convert a LastEvaluatedKey to a last evaluated key.
///
/// Every key attribute this crate writes is a string.
pub fn attributes_to_last_key(attributes: &HashMap<String, AttributeValue>) -> Result<LastKey> {
    attributes
        .iter()
        .map(|(name, value)| match value {
            AttributeValue::S(s) => Ok((name.clone(), s.clone())),
            other => Err(StorageError::InvalidData(format!(
                "Key attribute '{name}' is not a string: {other:?}"
            ))),
        })
        .collect()
}

/// Convert expression placeholder values to attribute values.
pub fn expression_values(values: &BTreeMap<String, Value>) -> HashMap<String, AttributeValue> {
    values
        .iter()
        .map(|(placeholder, value)| (placeholder.clone(), to_attribute(value)))
        .collect()
}

/// Convert expression placeholder names to the SDK's map type.
pub fn expression_names(names: &BTreeMap<String, String>) -> HashMap<String, String> {
    names
        .iter()
        .map(|(placeholder, name)| (placeholder.clone(), name.clone()))
        .collect()
}
