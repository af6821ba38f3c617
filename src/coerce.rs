//! Conversions from loosely-typed decoded values into the primitives that
//! settings fields hold.
//!
//! File decoders hand back `serde_json::Value`s whose runtime type is
//! whatever the document said. These helpers check that type against the
//! field's and fail with [`ClifError::UnmarshalType`] naming the offending
//! key. Raw text from the environment or the command line goes through
//! [`from_text`] first, which is directed by the target [`LeafKind`].

use serde_json::{Number, Value};

use crate::error::ClifError;
use crate::settings::LeafKind;

/// Human name of a value's runtime type, for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

fn mismatch(key: &str, expected: &'static str, value: &Value) -> ClifError {
    ClifError::UnmarshalType {
        key: key.to_string(),
        expected,
        found: type_name(value),
    }
}

/// Integral numbers pass through; floats are truncated toward zero.
pub fn to_int(key: &str, value: &Value) -> Result<i64, ClifError> {
    let Value::Number(n) = value else {
        return Err(mismatch(key, "int", value));
    };
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    if let Some(u) = n.as_u64() {
        return Err(ClifError::OutOfRange {
            key: key.to_string(),
            value: u.to_string(),
            target: "i64",
        });
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 => Ok(f as i64),
        _ => Err(ClifError::OutOfRange {
            key: key.to_string(),
            value: n.to_string(),
            target: "i64",
        }),
    }
}

/// Like [`to_int`], then narrowed to `T` with a range check.
pub fn to_int_as<T: TryFrom<i64>>(
    key: &str,
    value: &Value,
    target: &'static str,
) -> Result<T, ClifError> {
    let i = to_int(key, value)?;
    T::try_from(i).map_err(|_| ClifError::OutOfRange {
        key: key.to_string(),
        value: i.to_string(),
        target,
    })
}

/// Unsigned 64-bit values above `i64::MAX` are accepted here.
pub fn to_u64(key: &str, value: &Value) -> Result<u64, ClifError> {
    if let Value::Number(n) = value
        && let Some(u) = n.as_u64()
    {
        return Ok(u);
    }
    to_int_as(key, value, "u64")
}

pub fn to_float(key: &str, value: &Value) -> Result<f64, ClifError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| mismatch(key, "float", value)),
        _ => Err(mismatch(key, "float", value)),
    }
}

pub fn to_bool(key: &str, value: &Value) -> Result<bool, ClifError> {
    match value {
        Value::Bool(b) => Ok(*b),
        _ => Err(mismatch(key, "bool", value)),
    }
}

pub fn to_string(key: &str, value: &Value) -> Result<String, ClifError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(mismatch(key, "string", value)),
    }
}

/// Convert raw text into a typed value for a leaf of the given kind.
///
/// Booleans accept `true`/`false` in any case. Integers and floats use the
/// standard parsers. Strings pass through untouched.
pub fn from_text(key: &str, raw: &str, kind: LeafKind) -> Result<Value, ClifError> {
    let invalid = |reason: String| ClifError::InvalidValue {
        key: key.to_string(),
        reason,
    };
    let trimmed = raw.trim();
    match kind {
        LeafKind::Str => Ok(Value::String(raw.to_string())),
        LeafKind::Bool => {
            if trimmed.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(invalid(format!("'{raw}' is not a bool")))
            }
        }
        LeafKind::Int => {
            if let Ok(i) = trimmed.parse::<i64>() {
                Ok(Value::from(i))
            } else if let Ok(u) = trimmed.parse::<u64>() {
                Ok(Value::from(u))
            } else {
                Err(invalid(format!("'{raw}' is not an integer")))
            }
        }
        LeafKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid(format!("'{raw}' is not a number"))),
    }
}
