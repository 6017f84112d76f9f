//! Structural equality for command schema values
//!
//! Schema values are a closed set: null, booleans, numbers, strings, ordered
//! sequences and unordered key maps. Maps compare by key set, not by key
//! order. Sequences compare element by element.

use serde_json::{Number, Value};

/// Deep equality over two schema values
pub fn deep_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, value)| {
                    b.get(key).is_some_and(|other| deep_equal(value, other))
                })
        }
        _ => false,
    }
}

// `1` and `1.0` are the same number to the API
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_is_ignored() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        assert!(deep_equal(&a, &b));
        assert!(deep_equal(&b, &a));
    }

    #[test]
    fn test_extra_key_is_unequal() {
        let a = json!({"a": 1});
        let b = json!({"a": 1, "b": 2});
        assert!(!deep_equal(&a, &b));
        assert!(!deep_equal(&b, &a));
    }

    #[test]
    fn test_reflexive_on_nested_schema() {
        let schema = json!({
            "name": "remind",
            "description": "Set a reminder",
            "options": [
                {"name": "when", "type": 3, "required": true},
                {"name": "what", "type": 3, "choices": [{"name": "x", "value": "y"}]}
            ],
            "dm_permission": false,
            "default_member_permissions": null
        });
        assert!(deep_equal(&schema, &schema.clone()));
    }

    #[test]
    fn test_sequence_order_matters() {
        assert!(!deep_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!deep_equal(&json!([1, 2]), &json!([1, 2, 3])));
    }

    #[test]
    fn test_nested_difference_detected() {
        let a = json!({"options": [{"name": "x", "required": true}]});
        let b = json!({"options": [{"name": "x", "required": false}]});
        assert!(!deep_equal(&a, &b));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(deep_equal(&json!(1), &json!(1.0)));
        assert!(deep_equal(&json!(-3), &json!(-3)));
        assert!(!deep_equal(&json!(1), &json!(2)));
        assert!(deep_equal(&json!(u64::MAX), &json!(u64::MAX)));
    }

    #[test]
    fn test_type_mismatch_is_unequal() {
        assert!(!deep_equal(&json!("1"), &json!(1)));
        assert!(!deep_equal(&json!(null), &json!(false)));
        assert!(!deep_equal(&json!({}), &json!([])));
    }
}
