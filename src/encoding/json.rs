//! JSON is used for the textual plan encoding, and as the generic message
//! form that plans are bridged through (`serde_json::Value`).

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Serializes a value to pretty-printed JSON.
pub fn serialize<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Deserializes a value from JSON text.
pub fn deserialize<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

/// Converts a value into a generic JSON message.
pub fn to_message<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

/// Converts a generic JSON message into a typed value.
pub fn from_message<T: DeserializeOwned>(message: serde_json::Value) -> Result<T> {
    Ok(serde_json::from_value(message)?)
}
