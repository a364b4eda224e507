//! Foreach collection normalization.
//!
//! Ordered sequences yield `(item, index)` pairs and keyed collections
//! yield `(key, value, index)` triples. A loop binds as many leading tuple
//! members as it declares identifiers.

use hexel_expr::{Position, Value};

use crate::RenderError;

/// Normalize `value` into iteration tuples.
pub fn create_collection(value: &Value, position: Position) -> Result<Vec<Vec<Value>>, RenderError> {
    let tuples = match value {
        Value::Undefined | Value::Null => {
            return Err(RenderError::NullCollection {
                line: position.line,
                column: position.column,
            });
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| vec![item.clone(), Value::from(index)])
            .collect(),
        Value::String(text) => text
            .chars()
            .enumerate()
            .map(|(index, c)| vec![Value::String(c.to_string()), Value::from(index)])
            .collect(),
        Value::Object(fields) => fields
            .iter()
            .enumerate()
            .map(|(index, (key, value))| {
                vec![Value::from(key.as_str()), value.clone(), Value::from(index)]
            })
            .collect(),
        other => {
            return Err(RenderError::NotIterable {
                type_name: other.type_name(),
                line: position.line,
                column: position.column,
            });
        }
    };
    Ok(tuples)
}
