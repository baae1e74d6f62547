//! Parameter decoding.
//!
//! Parameters arrive as a JSON array and are bound as text, leaving the
//! server to infer each placeholder's type.

use serde_json::Value;

use crate::error::{BridgeError, Result};
use crate::pg::array::{self, Element};

/// Decode a parameter string.
///
/// An empty string means "no parameters": the SQL is sent as-is. `[]` binds
/// zero parameters through the extended protocol.
pub fn decode_params(text: &str) -> Result<Option<Vec<Option<String>>>> {
    if text.is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| BridgeError::BadParams(e.to_string()))?;

    match value {
        Value::Array(items) => Ok(Some(items.iter().map(encode_param).collect())),
        other => Err(BridgeError::BadParams(format!(
            "expected a JSON array, got {}",
            kind(&other)
        ))),
    }
}

fn encode_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(array::format(
            &items.iter().map(to_element).collect::<Vec<_>>(),
        )),
        // Objects bind as JSON text for json/jsonb placeholders
        Value::Object(_) => Some(value.to_string()),
    }
}

fn to_element(value: &Value) -> Element {
    match value {
        Value::Null => Element::Null,
        Value::Array(items) => Element::Nested(items.iter().map(to_element).collect()),
        Value::String(s) => Element::Text(s.clone()),
        other => Element::Text(other.to_string()),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
