//! Conversion of argument lists into JSON-safe values.
//!
//! Each argument is handled independently and in order:
//!
//! - `Undefined` becomes the string `"undefined"`.
//! - `Null` stays `null`.
//! - Error-like values become `{ "__type": "Error", name, message, stack }`.
//! - Objects, arrays and native handles are copied structurally. Native
//!   handles inside the copy become short tag strings. A cycle, or nesting
//!   deeper than [`MAX_DEPTH`], abandons the copy and the argument falls back
//!   to its string coercion.
//! - Booleans, numbers and strings pass through. Non-finite numbers become
//!   `null` because JSON cannot carry them.
//!
//! None of these functions can fail or panic on user input.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::value::{ArgValue, ErrorValue, MAX_DEPTH, ObjectBody, ObjectRef};

/// Reasons a structural copy is abandoned.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum SerialiseError {
    #[error("cyclic reference")]
    CyclicReference,
    #[error("nesting deeper than {MAX_DEPTH} levels")]
    DepthExceeded,
}

/// Serialise every argument of a console call.
pub fn serialise_args(args: &[ArgValue]) -> Vec<Value> {
    args.iter().map(serialise_value).collect()
}

/// Serialise one top-level argument.
pub fn serialise_value(value: &ArgValue) -> Value {
    match value {
        ArgValue::Undefined => Value::String("undefined".to_owned()),
        ArgValue::Null => Value::Null,
        ArgValue::Error(err) => tagged_error(err),
        ArgValue::Object(_) | ArgValue::Native(_) => {
            structural_copy(value).unwrap_or_else(|_| Value::String(value.to_string()))
        }
        ArgValue::Bool(b) => Value::Bool(*b),
        ArgValue::Number(n) => number(*n),
        ArgValue::String(s) => Value::String(s.clone()),
    }
}

/// Tagged representation of an error-like value.
pub fn tagged_error(err: &ErrorValue) -> Value {
    let mut map = Map::new();
    map.insert("__type".to_owned(), Value::from("Error"));
    map.insert("name".to_owned(), Value::from(err.name.as_str()));
    map.insert("message".to_owned(), Value::from(err.message.as_str()));
    if let Some(stack) = &err.stack {
        map.insert("stack".to_owned(), Value::from(stack.as_str()));
    }
    Value::Object(map)
}

pub(crate) fn structural_copy(value: &ArgValue) -> Result<Value, SerialiseError> {
    let mut path = Vec::new();
    Ok(copy_value(value, &mut path)?.unwrap_or(Value::Null))
}

/// Copy one value; `None` marks values JSON leaves out.
fn copy_value(value: &ArgValue, path: &mut Vec<usize>) -> Result<Option<Value>, SerialiseError> {
    let json = match value {
        ArgValue::Undefined => return Ok(None),
        ArgValue::Null => Value::Null,
        ArgValue::Bool(b) => Value::Bool(*b),
        ArgValue::Number(n) => number(*n),
        ArgValue::String(s) => Value::String(s.clone()),
        ArgValue::Error(err) => tagged_error(err),
        ArgValue::Native(handle) => Value::String(handle.to_string()),
        ArgValue::Object(obj) => copy_object(obj, path)?,
    };
    Ok(Some(json))
}

fn copy_object(obj: &ObjectRef, path: &mut Vec<usize>) -> Result<Value, SerialiseError> {
    let id = obj.id();
    // Checked before locking: the node may already be read-locked further up.
    if path.contains(&id) {
        return Err(SerialiseError::CyclicReference);
    }
    if path.len() >= MAX_DEPTH {
        return Err(SerialiseError::DepthExceeded);
    }
    path.push(id);
    let body = obj.read();
    let json = match &*body {
        ObjectBody::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, item) in entries {
                if let Some(json) = copy_value(item, path)? {
                    map.insert(key.clone(), json);
                }
            }
            Value::Object(map)
        }
        ObjectBody::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(copy_value(item, path)?.unwrap_or(Value::Null));
            }
            Value::Array(out)
        }
    };
    path.pop();
    Ok(json)
}

/// Integral values are emitted without a fractional part.
fn number(n: f64) -> Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}
