//! Lenient field extraction: a field of the wrong JSON type reads as `None`.

use serde_json::{Map, Value};

fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// Strings as-is, numbers and booleans stringified.
pub(crate) fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match lookup(object, keys)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numbers, or strings holding a number.
pub(crate) fn float_field(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    let value = match lookup(object, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Integers, integral floats, or strings holding an integer.
pub(crate) fn int_field(object: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    match lookup(object, keys)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
