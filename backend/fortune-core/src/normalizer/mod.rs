//! Maps loosely-shaped server payloads into the flat models UIs read.
//!
//! Each payload is first deserialized into a private "raw" struct whose
//! fields are all optional and tolerate type mismatches. The mapping
//! functions then decide, field by field, between a documented default and
//! leaving the value absent.

pub mod auth;
pub mod divination;
pub mod history;
pub mod stats;

pub use auth::{auth_session, free_count, token_pair, user_profile};
pub use divination::{check_consistency, divination_result};
pub use history::history_page;
pub use stats::stats;

use crate::error::PipelineError;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize `data` into a raw shape, requiring a JSON object.
#[track_caller]
pub(crate) fn raw_object<T: DeserializeOwned>(data: &Value, shape: &str) -> Result<T, PipelineError> {
    if !data.is_object() {
        return Err(PipelineError::malformed(format!(
            "Expected {shape} object, got {}",
            json_type(data)
        )));
    }
    Ok(T::deserialize(data)?)
}

/// Field deserializer that yields `None` instead of failing on a type mismatch.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Non-blank, trimmed text.
pub(crate) fn text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// String or number rendered as a string. Ids come as both.
pub(crate) fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) => text(Some(id.clone())),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Non-negative integer given as a number or a numeric string.
pub(crate) fn unsigned(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Finite float given as a number or a numeric string.
pub(crate) fn float(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|number| number.is_finite())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
