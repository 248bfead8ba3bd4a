//! Type coercion for loosely typed payload fields
//!
//! Payloads are generic JSON documents, so a field that business logic
//! thinks of as an integer may arrive as `3.0`, and a list of labels may
//! arrive as a mixed array. The `coerce_*` functions map any shape onto a
//! canonical typed value and never fail:
//!
//! | Function | Accepted shapes | Fallback |
//! |----------|-----------------|----------|
//! | [`coerce_int`] | integer, float (truncated) | `0` |
//! | [`coerce_float`] | integer, float | `0.0` |
//! | [`coerce_bool`] | bool | `false` |
//! | [`coerce_string`] | string | `""` |
//! | [`coerce_string_sequence`] | array (string elements kept) | `[]` |
//! | [`coerce_string_map`] | object (string values kept) | `{}` |
//!
//! Callers that must reject bad input use the `expect_*` variants, which
//! return `InvalidShape` instead of falling back.

use crate::error::{Error, Result};
use crate::types::Payload;
use serde_json::Value;
use std::collections::BTreeMap;

/// Name of a value's shape, for error messages
pub fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Interpret a value as an integer, defaulting to 0
///
/// Floats are truncated toward zero and saturate at the `i64` bounds.
/// Non-finite floats and every non-numeric shape (including numeric
/// strings) yield 0.
pub fn coerce_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(u) = n.as_u64() {
                i64::try_from(u).unwrap_or(i64::MAX)
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() => f as i64,
                    _ => 0,
                }
            }
        }
        _ => 0,
    }
}

/// Interpret a value as a float, defaulting to 0.0
pub fn coerce_float(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

/// Interpret a value as a bool, defaulting to false
pub fn coerce_bool(value: &Value) -> bool {
    value.as_bool().unwrap_or(false)
}

/// Interpret a value as a string, defaulting to empty
pub fn coerce_string(value: &Value) -> String {
    value.as_str().map(str::to_owned).unwrap_or_default()
}

/// Interpret a value as a sequence of strings
///
/// Non-string elements are dropped; any non-array shape yields an empty
/// sequence.
pub fn coerce_string_sequence(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}

/// Interpret a value as a string-to-string map (e.g. labels)
///
/// Entries whose value is not a string are dropped.
pub fn coerce_string_map(value: &Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(fields) => fields
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Strict integer read
///
/// Accepts integers and integral floats in `i64` range.
pub fn expect_int(field: &str, value: &Value) -> Result<i64> {
    let invalid = || Error::InvalidShape {
        field: field.to_string(),
        expected: "integer",
        actual: shape_name(value),
    };
    let n = match value {
        Value::Number(n) => n,
        _ => return Err(invalid()),
    };
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(f as i64)
        }
        _ => Err(invalid()),
    }
}

/// Strict string-sequence read: every element must be a string
pub fn expect_string_sequence(field: &str, value: &Value) -> Result<Vec<String>> {
    let items = value.as_array().ok_or_else(|| Error::InvalidShape {
        field: field.to_string(),
        expected: "array of strings",
        actual: shape_name(value),
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_owned)
                .ok_or_else(|| Error::InvalidShape {
                    field: field.to_string(),
                    expected: "string element",
                    actual: shape_name(item),
                })
        })
        .collect()
}

/// [`coerce_int`] on a payload field; a missing field yields 0
pub fn field_int(payload: &Payload, field: &str) -> i64 {
    payload.get(field).map(coerce_int).unwrap_or(0)
}

/// [`coerce_string_sequence`] on a payload field; a missing field yields `[]`
pub fn field_strings(payload: &Payload, field: &str) -> Vec<String> {
    payload
        .get(field)
        .map(coerce_string_sequence)
        .unwrap_or_default()
}
