//! Post-filter evaluation against stored items.

use std::cmp::Ordering;

use serde_json::Value;

use singletable_core::condition::{FilterClause, FilterCondition, FilterOperand, FilterOperator};
use singletable_core::storage::Item;

/// Returns true when every clause holds for `item`.
pub(crate) fn matches_filter(filter: &FilterCondition, item: &Item) -> bool {
    filter
        .clauses
        .iter()
        .all(|clause| matches_clause(clause, item))
}

fn matches_clause(clause: &FilterClause, item: &Item) -> bool {
    // A missing attribute only satisfies `<>`.
    let Some(actual) = item.get(&clause.field).filter(|v| !v.is_null()) else {
        return matches!(clause.operand, FilterOperand::Compare(FilterOperator::Ne, _));
    };

    match &clause.operand {
        FilterOperand::Compare(FilterOperator::BeginsWith, prefix) => match (actual, prefix) {
            (Value::String(actual), Value::String(prefix)) => actual.starts_with(prefix.as_str()),
            _ => false,
        },
        FilterOperand::Compare(FilterOperator::Eq, expected) => equals(actual, expected),
        FilterOperand::Compare(FilterOperator::Ne, expected) => !equals(actual, expected),
        FilterOperand::Compare(op, expected) => match compare(actual, expected) {
            Some(ordering) => match op {
                FilterOperator::Gt => ordering == Ordering::Greater,
                FilterOperator::Gte => ordering != Ordering::Less,
                FilterOperator::Lt => ordering == Ordering::Less,
                FilterOperator::Lte => ordering != Ordering::Greater,
                _ => false,
            },
            None => false,
        },
        FilterOperand::Between(low, high) => {
            compare(actual, low).is_some_and(|o| o != Ordering::Less)
                && compare(actual, high).is_some_and(|o| o != Ordering::Greater)
        }
    }
}

fn equals(actual: &Value, expected: &Value) -> bool {
    compare(actual, expected).map_or(actual == expected, |o| o == Ordering::Equal)
}

// Values of different types are not comparable.
fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
