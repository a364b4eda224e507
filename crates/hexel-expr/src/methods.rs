//! Built-in methods on strings and arrays.
//!
//! Methods never mutate their receiver: values are owned copies, so
//! `reverse()` returns a reversed array instead of reversing in place.

use crate::eval::call_function;
use crate::value::{Function, Value};
use crate::{EvalError, Scope};

/// Longest string `repeat` may build, in bytes.
const MAX_STRING_LENGTH: usize = (1 << 29) - 24;

/// Call `receiver.name(args)`. `Ok(None)` when no such method exists.
pub(crate) fn call_method(
    receiver: &Value,
    name: &str,
    args: &[Value],
    scope: &mut dyn Scope,
) -> Result<Option<Value>, EvalError> {
    if name == "toString" {
        return Ok(Some(Value::String(receiver.to_string())));
    }

    match receiver {
        Value::String(s) => string_method(s, name, args),
        Value::Array(items) => array_method(items, name, args, scope),
        _ => Ok(None),
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Result<Option<Value>, EvalError> {
    let value = match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "includes" => Value::Bool(s.contains(text_arg(args, 0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(text_arg(args, 0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(text_arg(args, 0).as_str())),
        "split" => {
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::from(s)],
                Some(separator) => {
                    let separator = separator.to_string();
                    if separator.is_empty() {
                        s.chars().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str()).map(Value::from).collect()
                    }
                }
            };
            Value::Array(parts)
        }
        "repeat" => {
            let count = arg(args, 0).to_number();
            let count = if count.is_nan() { 0.0 } else { count.trunc() };
            if count < 0.0 || count.is_infinite() {
                return Err(EvalError::Range(format!(
                    "Invalid count value: {}",
                    crate::format_number(count)
                )));
            }
            let length = s.len() as f64 * count;
            if length > MAX_STRING_LENGTH as f64 {
                return Err(EvalError::Range("Invalid string length".into()));
            }
            Value::String(s.repeat(count as usize))
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn array_method(
    items: &[Value],
    name: &str,
    args: &[Value],
    scope: &mut dyn Scope,
) -> Result<Option<Value>, EvalError> {
    let value = match name {
        "join" => {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(separator) => separator.to_string(),
            };
            let parts: Vec<String> = items.iter().map(Value::to_string).collect();
            Value::String(parts.join(&separator))
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.iter().any(|item| same_value_zero(item, &needle)))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            let index = items.iter().position(|item| item.strict_equals(&needle));
            Value::Number(index.map_or(-1.0, |i| i as f64))
        }
        "map" => {
            let callback = callback_arg(args, "map")?;
            let mut mapped = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                mapped.push(call_function(
                    &callback,
                    &[item.clone(), Value::from(index)],
                    scope,
                )?);
            }
            Value::Array(mapped)
        }
        "filter" => {
            let callback = callback_arg(args, "filter")?;
            let mut kept = Vec::new();
            for (index, item) in items.iter().enumerate() {
                let keep = call_function(&callback, &[item.clone(), Value::from(index)], scope)?;
                if keep.is_truthy() {
                    kept.push(item.clone());
                }
            }
            Value::Array(kept)
        }
        "slice" => {
            let len = items.len();
            let start = relative_index(args.first(), len, 0);
            let end = relative_index(args.get(1), len, len);
            Value::Array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            })
        }
        "concat" => {
            let mut joined = items.to_vec();
            for extra in args {
                match extra {
                    Value::Array(more) => joined.extend(more.iter().cloned()),
                    other => joined.push(other.clone()),
                }
            }
            Value::Array(joined)
        }
        "reverse" => Value::Array(items.iter().rev().cloned().collect()),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn text_arg(args: &[Value], index: usize) -> String {
    match args.get(index) {
        None | Some(Value::Undefined) => "undefined".into(),
        Some(value) => value.to_string(),
    }
}

fn callback_arg(args: &[Value], method: &str) -> Result<Function, EvalError> {
    match args.first() {
        Some(Value::Function(function)) => Ok(function.clone()),
        Some(other) => Err(EvalError::Type(format!(
            "{} is not a function (in Array.{method})",
            other.type_name()
        ))),
        None => Err(EvalError::Type(format!(
            "undefined is not a function (in Array.{method})"
        ))),
    }
}

/// Resolve a possibly negative slice bound against `len`.
fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    let n = match value {
        None | Some(Value::Undefined) => return default,
        Some(value) => value.to_number(),
    };
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}
