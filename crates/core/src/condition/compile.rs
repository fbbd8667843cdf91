use std::fmt;

use serde_json::{Map, Value};

use super::filter::{Filter, FilterClause, KeyOperand, KeyOperator, SortKeyFilter};
use crate::keys::{
    encode_partition_key, encode_sort_key, field_value, render_value, segment, KEY_SEPARATOR,
};
use crate::schema::{IndexSchema, TableSchema};
use crate::storage::{Result, StorageError, PARTITION_KEY_ATTR, SORT_KEY_ATTR};

/// Compiled restriction on the sort-key attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortCondition {
    Eq(String),
    BeginsWith(String),
    Gte(String),
    Lte(String),
    Gt(String),
    Lt(String),
    Between(String, String),
}

impl SortCondition {
    /// Whether an encoded sort key satisfies the condition.
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            SortCondition::Eq(v) => sort_key == v,
            SortCondition::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
            SortCondition::Gte(v) => sort_key >= v.as_str(),
            SortCondition::Lte(v) => sort_key <= v.as_str(),
            SortCondition::Gt(v) => sort_key > v.as_str(),
            SortCondition::Lt(v) => sort_key < v.as_str(),
            SortCondition::Between(low, high) => {
                sort_key >= low.as_str() && sort_key <= high.as_str()
            }
        }
    }

    fn from_operator(op: KeyOperator, key: String) -> Self {
        match op {
            KeyOperator::BeginsWith => SortCondition::BeginsWith(key),
            KeyOperator::Gte => SortCondition::Gte(key),
            KeyOperator::Lte => SortCondition::Lte(key),
            KeyOperator::Gt => SortCondition::Gt(key),
            KeyOperator::Lt => SortCondition::Lt(key),
        }
    }
}

/// Compiled key condition: partition equality plus an optional sort
/// restriction, addressed to the primary key or one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub partition_attr: &'static str,
    pub partition_key: String,
    pub sort_attr: &'static str,
    pub sort: Option<SortCondition>,
}

impl fmt::Display for KeyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:?}", self.partition_attr, self.partition_key)?;
        let attr = self.sort_attr;
        match &self.sort {
            None => Ok(()),
            Some(SortCondition::Eq(v)) => write!(f, " AND {attr} = {v:?}"),
            Some(SortCondition::BeginsWith(v)) => write!(f, " AND begins_with({attr}, {v:?})"),
            Some(SortCondition::Gte(v)) => write!(f, " AND {attr} >= {v:?}"),
            Some(SortCondition::Lte(v)) => write!(f, " AND {attr} <= {v:?}"),
            Some(SortCondition::Gt(v)) => write!(f, " AND {attr} > {v:?}"),
            Some(SortCondition::Lt(v)) => write!(f, " AND {attr} < {v:?}"),
            Some(SortCondition::Between(low, high)) => {
                write!(f, " AND {attr} BETWEEN {low:?} AND {high:?}")
            }
        }
    }
}

/// Compiled post-filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub clauses: Vec<FilterClause>,
}

/// Compiles the key condition for a query against the primary key, or
/// against `index` when given.
pub fn compile_key_condition(
    schema: &TableSchema,
    index: Option<&IndexSchema>,
    partition_values: &Map<String, Value>,
    filter: &SortKeyFilter,
) -> Result<KeyCondition> {
    let type_name = schema.type_name();
    let (partition_fields, sort_fields, partition_attr, sort_attr) = match index {
        Some(index) => (
            index.partition_key_fields.as_slice(),
            index.sort_key_fields.as_slice(),
            index.id.partition_key_attr(),
            index.id.sort_key_attr(),
        ),
        None => (
            schema.partition_key_fields(),
            schema.sort_key_fields(),
            PARTITION_KEY_ATTR,
            SORT_KEY_ATTR,
        ),
    };

    Ok(KeyCondition {
        partition_attr,
        partition_key: encode_partition_key(type_name, partition_fields, partition_values),
        sort_attr,
        sort: compile_sort_condition(type_name, sort_fields, filter)?,
    })
}

/// Compiles a sort-key filter against the declared sort fields.
///
/// Rejects filters that name undeclared fields, skip a declared field,
/// put an operator anywhere but on the last supplied field, or carry an
/// operator inside a `between` bound.
pub fn compile_sort_condition(
    type_name: &str,
    sort_fields: &[String],
    filter: &SortKeyFilter,
) -> Result<Option<SortCondition>> {
    if sort_fields.is_empty() {
        return match filter {
            SortKeyFilter::Unbounded => Ok(Some(SortCondition::Eq(type_name.to_string()))),
            SortKeyFilter::Fields(fields) if fields.is_empty() => {
                Ok(Some(SortCondition::Eq(type_name.to_string())))
            }
            _ => Err(StorageError::InvalidFilter(format!(
                "{type_name} declares no sort key fields"
            ))),
        };
    }

    match filter {
        SortKeyFilter::Unbounded => Ok(None),
        SortKeyFilter::Between(lower, upper) => Ok(Some(SortCondition::Between(
            encode_bound(type_name, sort_fields, lower)?,
            encode_bound(type_name, sort_fields, upper)?,
        ))),
        SortKeyFilter::Fields(fields) => compile_fields(sort_fields, fields),
    }
}

fn compile_fields(
    sort_fields: &[String],
    supplied: &[(String, KeyOperand)],
) -> Result<Option<SortCondition>> {
    let mut operands: Vec<Option<&KeyOperand>> = vec![None; sort_fields.len()];
    for (field, operand) in supplied {
        let position = declared_position(sort_fields, field)?;
        if operands[position].is_some() {
            return Err(StorageError::InvalidFilter(format!(
                "sort key field '{field}' given more than once"
            )));
        }
        if !matches!(operand, KeyOperand::Value(Value::Null)) {
            operands[position] = Some(operand);
        }
    }

    let Some(last) = operands.iter().rposition(Option::is_some) else {
        return Ok(None);
    };

    let mut segments = Vec::with_capacity(last + 1);
    let mut operator = None;
    for (position, operand) in operands[..=last].iter().enumerate() {
        let field = &sort_fields[position];
        let value = match operand {
            None => {
                return Err(StorageError::InvalidFilter(format!(
                    "sort key field '{field}' must be given before '{}'",
                    sort_fields[last]
                )))
            }
            Some(KeyOperand::Value(value)) => value,
            Some(KeyOperand::Operator(op, value)) => {
                if position != last {
                    return Err(StorageError::InvalidFilter(format!(
                        "operator on '{field}' must be on the last sort key field given"
                    )));
                }
                operator = Some(*op);
                value
            }
        };
        segments.push(segment(field, &render_value(value)));
    }

    let key = segments.join(KEY_SEPARATOR);
    let condition = match operator {
        Some(op) => SortCondition::from_operator(op, key),
        None if last + 1 == sort_fields.len() => SortCondition::Eq(key),
        // Trailing separator keeps `status#a` from matching `status#ab`.
        None => SortCondition::BeginsWith(format!("{key}{KEY_SEPARATOR}")),
    };
    Ok(Some(condition))
}

/// Encodes one side of a `between`, stopping at the first absent field.
fn encode_bound(
    type_name: &str,
    sort_fields: &[String],
    bound: &Map<String, Value>,
) -> Result<String> {
    for field in bound.keys() {
        declared_position(sort_fields, field)?;
    }
    if bound.values().any(Value::is_object) {
        return Err(StorageError::InvalidFilter(
            "between bounds take plain values, not operators".to_string(),
        ));
    }

    let prefix_len = sort_fields
        .iter()
        .take_while(|field| field_value(bound, field).is_some())
        .count();
    if let Some(stray) = sort_fields[prefix_len..]
        .iter()
        .find(|field| field_value(bound, field).is_some())
    {
        return Err(StorageError::InvalidFilter(format!(
            "between bound skips '{}' before '{stray}'",
            sort_fields[prefix_len]
        )));
    }

    // An empty bound would compile to an empty key value, which engines refuse.
    if prefix_len == 0 {
        return Err(StorageError::InvalidFilter(format!(
            "between bound must give '{}'",
            sort_fields.first().map_or("a sort key field", String::as_str)
        )));
    }
    Ok(encode_sort_key(type_name, &sort_fields[..prefix_len], bound))
}

fn declared_position(sort_fields: &[String], field: &str) -> Result<usize> {
    sort_fields
        .iter()
        .position(|declared| declared == field)
        .ok_or_else(|| StorageError::InvalidFilter(format!("'{field}' is not a sort key field")))
}

/// Compiles a post-filter; an empty filter compiles to nothing.
pub fn compile_filter(filter: &Filter) -> Option<FilterCondition> {
    if filter.is_empty() {
        None
    } else {
        Some(FilterCondition {
            clauses: filter.clauses().to_vec(),
        })
    }
}
