//! Condition compiler.
//!
//! Turns sort-key filters and post-filters into engine conditions. The
//! compiled form is structured ([`KeyCondition`], [`FilterCondition`]) so an
//! engine can either render it ([`Expression`]) or evaluate it directly.

mod compile;
mod expression;
mod filter;

pub use compile::{
    compile_filter, compile_key_condition, compile_sort_condition, FilterCondition, KeyCondition,
    SortCondition,
};
pub use expression::Expression;
pub use filter::{
    Filter, FilterClause, FilterOperand, FilterOperator, KeyOperand, KeyOperator, SortKeyFilter,
};
