use std::collections::BTreeMap;

use serde_json::Value;

use super::compile::{FilterCondition, KeyCondition, SortCondition};
use super::filter::{FilterOperand, FilterOperator};

/// Condition text with its attribute-name and attribute-value placeholders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expression {
    pub text: String,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, Value>,
}

impl Expression {
    fn name(&mut self, placeholder: String, attr: &str) -> String {
        self.names.insert(placeholder.clone(), attr.to_string());
        placeholder
    }

    fn value(&mut self, placeholder: String, value: Value) -> String {
        self.values.insert(placeholder.clone(), value);
        placeholder
    }
}

impl KeyCondition {
    /// Renders as a key condition expression (`#pk = :pk AND ...`).
    pub fn to_expression(&self) -> Expression {
        let mut expr = Expression::default();
        let pk = expr.name("#pk".to_string(), self.partition_attr);
        let pk_value = expr.value(":pk".to_string(), Value::String(self.partition_key.clone()));
        let mut text = format!("{pk} = {pk_value}");

        if let Some(sort) = &self.sort {
            let sk = expr.name("#sk".to_string(), self.sort_attr);
            let clause = match sort {
                SortCondition::Between(low, high) => {
                    let low = expr.value(":sk".to_string(), Value::String(low.clone()));
                    let high = expr.value(":sk_end".to_string(), Value::String(high.clone()));
                    format!("{sk} BETWEEN {low} AND {high}")
                }
                SortCondition::BeginsWith(prefix) => {
                    let prefix = expr.value(":sk".to_string(), Value::String(prefix.clone()));
                    format!("begins_with({sk}, {prefix})")
                }
                SortCondition::Eq(v)
                | SortCondition::Gte(v)
                | SortCondition::Lte(v)
                | SortCondition::Gt(v)
                | SortCondition::Lt(v) => {
                    let symbol = match sort {
                        SortCondition::Eq(_) => "=",
                        SortCondition::Gte(_) => ">=",
                        SortCondition::Lte(_) => "<=",
                        SortCondition::Gt(_) => ">",
                        _ => "<",
                    };
                    let v = expr.value(":sk".to_string(), Value::String(v.clone()));
                    format!("{sk} {symbol} {v}")
                }
            };
            text.push_str(" AND ");
            text.push_str(&clause);
        }

        expr.text = text;
        expr
    }
}

impl FilterCondition {
    /// Renders as a filter expression; clauses are joined with AND.
    pub fn to_expression(&self) -> Expression {
        let mut expr = Expression::default();
        let clauses: Vec<String> = self
            .clauses
            .iter()
            .enumerate()
            .map(|(i, clause)| {
                let name = expr.name(format!("#f{i}"), &clause.field);
                match &clause.operand {
                    FilterOperand::Compare(FilterOperator::BeginsWith, value) => {
                        let value = expr.value(format!(":f{i}"), value.clone());
                        format!("begins_with({name}, {value})")
                    }
                    FilterOperand::Compare(op, value) => {
                        let value = expr.value(format!(":f{i}"), value.clone());
                        let symbol = op.symbol().unwrap_or("=");
                        format!("{name} {symbol} {value}")
                    }
                    FilterOperand::Between(low, high) => {
                        let low = expr.value(format!(":f{i}_lo"), low.clone());
                        let high = expr.value(format!(":f{i}_hi"), high.clone());
                        format!("{name} BETWEEN {low} AND {high}")
                    }
                }
            })
            .collect();

        expr.text = clauses.join(" AND ");
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{compile_filter, Filter};
    use serde_json::json;

    fn key_condition(sort: Option<SortCondition>) -> KeyCondition {
        KeyCondition {
            partition_attr: "partitionKey",
            partition_key: "Task#userId#u1".to_string(),
            sort_attr: "sortKey",
            sort,
        }
    }

    #[test]
    fn test_partition_only() {
        let expr = key_condition(None).to_expression();
        assert_eq!(expr.text, "#pk = :pk");
        assert_eq!(expr.names["#pk"], "partitionKey");
        assert_eq!(expr.values[":pk"], json!("Task#userId#u1"));
        assert!(!expr.names.contains_key("#sk"));
    }

    #[test]
    fn test_range_condition() {
        let expr = key_condition(Some(SortCondition::Gte(
            "status#active#updatedAt#0000000000001000".to_string(),
        )))
        .to_expression();

        assert_eq!(expr.text, "#pk = :pk AND #sk >= :sk");
        assert_eq!(expr.names["#sk"], "sortKey");
        assert_eq!(
            expr.values[":sk"],
            json!("status#active#updatedAt#0000000000001000")
        );
    }

    #[test]
    fn test_begins_with_condition() {
        let expr = key_condition(Some(SortCondition::BeginsWith("status#active#".to_string())))
            .to_expression();
        assert_eq!(expr.text, "#pk = :pk AND begins_with(#sk, :sk)");
        assert_eq!(expr.values[":sk"], json!("status#active#"));
    }

    #[test]
    fn test_between_condition() {
        let expr = key_condition(Some(SortCondition::Between(
            "status#b".to_string(),
            "status#d".to_string(),
        )))
        .to_expression();
        assert_eq!(expr.text, "#pk = :pk AND #sk BETWEEN :sk AND :sk_end");
        assert_eq!(expr.values[":sk"], json!("status#b"));
        assert_eq!(expr.values[":sk_end"], json!("status#d"));
    }

    #[test]
    fn test_filter_expression() {
        let filter = Filter::new()
            .eq("kind", "bug")
            .gt("priority", 2)
            .begins_with("title", "Fix")
            .between("estimate", 1, 8);
        let expr = compile_filter(&filter).unwrap().to_expression();

        assert_eq!(
            expr.text,
            "#f0 = :f0 AND #f1 > :f1 AND begins_with(#f2, :f2) AND #f3 BETWEEN :f3_lo AND :f3_hi"
        );
        assert_eq!(expr.names["#f1"], "priority");
        assert_eq!(expr.values[":f1"], json!(2));
        assert_eq!(expr.values[":f3_hi"], json!(8));
    }
}
