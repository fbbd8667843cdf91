//! Key encoding.
//!
//! Pure functions that serialize named field values into partition-key and
//! sort-key strings. Numbers are zero-padded so that non-negative integers
//! sort lexicographically in numeric order.

use serde_json::{Map, Number, Value};

/// Separator between key segments.
pub const KEY_SEPARATOR: &str = "#";

/// Width numeric values are padded to.
pub const NUMERIC_WIDTH: usize = 16;

/// Rendering of a missing partition-key value.
pub const MISSING_VALUE: &str = "undefined";

/// Encode a partition key.
///
/// Pattern: `<type_name>#<field>#<value>...`, or `<type_name>` alone when no
/// fields are declared. A missing value encodes as `undefined`.
pub fn encode_partition_key(
    type_name: &str,
    fields: &[String],
    values: &Map<String, Value>,
) -> String {
    let mut key = type_name.to_string();
    for field in fields {
        let value = field_value(values, field)
            .map(render_value)
            .unwrap_or_else(|| MISSING_VALUE.to_string());
        key.push_str(KEY_SEPARATOR);
        key.push_str(field);
        key.push_str(KEY_SEPARATOR);
        key.push_str(&value);
    }
    key
}

/// Encode a sort key over the fields present in `values`.
///
/// Pattern: `<field>#<value>` segments joined by `#`, or `<type_name>` when
/// no fields are declared. Absent fields are skipped, so the same function
/// encodes both full keys and partial prefixes.
pub fn encode_sort_key(
    type_name: &str,
    fields: &[String],
    values: &Map<String, Value>,
) -> String {
    if fields.is_empty() {
        return type_name.to_string();
    }

    fields
        .iter()
        .filter_map(|field| {
            field_value(values, field).map(|value| segment(field, &render_value(value)))
        })
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Left-pad the decimal rendering of `n` with zeros to [`NUMERIC_WIDTH`].
///
/// Negative numbers keep their sign inside the padding (`-5` becomes
/// `00000000000000-5`) and therefore do not sort numerically.
pub fn pad_numeric(n: &Number) -> String {
    format!("{:0>width$}", decimal(n), width = NUMERIC_WIDTH)
}

/// A single `field#value` segment.
pub(crate) fn segment(field: &str, value: &str) -> String {
    format!("{field}{KEY_SEPARATOR}{value}")
}

/// Render a field value the way it appears inside a key.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => pad_numeric(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Look up a key field; `null` counts as absent.
pub(crate) fn field_value<'a>(values: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    values.get(field).filter(|value| !value.is_null())
}

fn decimal(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_partition_key_without_fields() {
        assert_eq!(encode_partition_key("User", &[], &Map::new()), "User");
    }

    #[test]
    fn test_partition_key_with_fields() {
        let v = values(json!({"orgId": "acme", "userId": "u1"}));
        assert_eq!(
            encode_partition_key("User", &fields(&["orgId", "userId"]), &v),
            "User#orgId#acme#userId#u1"
        );
    }

    #[test]
    fn test_partition_key_missing_value_is_undefined() {
        let v = values(json!({"orgId": "acme"}));
        assert_eq!(
            encode_partition_key("User", &fields(&["orgId", "userId"]), &v),
            "User#orgId#acme#userId#undefined"
        );
    }

    #[test]
    fn test_sort_key_without_fields() {
        let v = values(json!({"status": "active"}));
        assert_eq!(encode_sort_key("Task", &[], &v), "Task");
    }

    #[test]
    fn test_sort_key_full() {
        let v = values(json!({"status": "active", "updatedAt": 1000}));
        assert_eq!(
            encode_sort_key("Task", &fields(&["status", "updatedAt"]), &v),
            "status#active#updatedAt#0000000000001000"
        );
    }

    #[test]
    fn test_sort_key_partial_skips_absent_fields() {
        let v = values(json!({"status": "active"}));
        assert_eq!(
            encode_sort_key("Task", &fields(&["status", "updatedAt"]), &v),
            "status#active"
        );
    }

    #[test]
    fn test_sort_key_treats_null_as_absent() {
        let v = values(json!({"status": "active", "updatedAt": null}));
        assert_eq!(
            encode_sort_key("Task", &fields(&["status", "updatedAt"]), &v),
            "status#active"
        );
    }

    #[test]
    fn test_booleans_render_as_words() {
        let v = values(json!({"done": true}));
        assert_eq!(encode_sort_key("Task", &fields(&["done"]), &v), "done#true");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let v = values(json!({"a": "x", "b": 42, "c": false}));
        let f = fields(&["a", "b", "c"]);
        assert_eq!(
            encode_partition_key("T", &f, &v),
            encode_partition_key("T", &f, &v)
        );
        assert_eq!(encode_sort_key("T", &f, &v), encode_sort_key("T", &f, &v));
    }

    #[test]
    fn test_pad_numeric_width() {
        assert_eq!(pad_numeric(&Number::from(0)), "0000000000000000");
        assert_eq!(pad_numeric(&Number::from(1000)), "0000000000001000");
        assert_eq!(
            pad_numeric(&Number::from(9_999_999_999_999_999u64)),
            "9999999999999999"
        );
    }

    #[test]
    fn test_pad_numeric_fractions() {
        let n = Number::from_f64(1.5).unwrap();
        assert_eq!(pad_numeric(&n), "00000000000001.5");
    }

    #[test]
    fn test_padded_numbers_sort_lexicographically() {
        let samples: Vec<u64> = vec![
            0,
            1,
            9,
            10,
            99,
            100,
            1_000,
            65_535,
            1_000_000,
            123_456_789,
            9_007_199_254_740_991,
            9_999_999_999_999_999,
        ];
        for pair in samples.windows(2) {
            let a = pad_numeric(&Number::from(pair[0]));
            let b = pad_numeric(&Number::from(pair[1]));
            assert!(a < b, "{a} should sort before {b}");
        }
    }

    #[test]
    fn test_negative_numbers_keep_native_sign() {
        // The sign sits inside the padding, so negative values do not sort
        // numerically against each other: -1 lands before -2.
        let minus_five = pad_numeric(&Number::from(-5));
        let three = pad_numeric(&Number::from(3));
        assert_eq!(minus_five, "00000000000000-5");
        assert_eq!(pad_numeric(&Number::from(-10)), "0000000000000-10");
        assert!(minus_five < three);
        assert!(pad_numeric(&Number::from(-1)) < pad_numeric(&Number::from(-2)));
    }
}
