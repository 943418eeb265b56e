//! Per-message record encoding
//!
//! Every channel shares one schema. A message is the JSON encoding of a
//! [`SignalRecord`]; the schema record carries the matching JSON Schema.

use crate::types::{DecodedSignal, RawValue, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Schema encoding written to the container
pub const SCHEMA_ENCODING: &str = "jsonschema";

/// Message encoding written to every channel
pub const MESSAGE_ENCODING: &str = "json";

/// One decoded signal occurrence as stored in the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub timestamp_ns: u64,
    pub can_id: u32,
    pub message: String,
    pub signal: String,
    pub raw: RawValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl From<&DecodedSignal> for SignalRecord {
    fn from(signal: &DecodedSignal) -> Self {
        Self {
            timestamp_ns: signal.timestamp_ns,
            can_id: signal.can_id,
            message: signal.message_name.clone(),
            signal: signal.name.clone(),
            raw: signal.raw.clone(),
            physical: signal.physical,
            description: signal.description.clone(),
            unit: signal.unit().map(str::to_string),
        }
    }
}

/// Serialize one decoded signal into message bytes
pub fn encode(signal: &DecodedSignal) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&SignalRecord::from(signal))?)
}

/// JSON Schema describing [`SignalRecord`]
pub fn json_schema(name: &str) -> serde_json::Value {
    let variant = |tag: &str, body: serde_json::Value| {
        json!({
            "type": "object",
            "properties": { tag: body },
            "required": [tag],
            "additionalProperties": false
        })
    };

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": name,
        "type": "object",
        "properties": {
            "timestamp_ns": { "type": "integer", "minimum": 0 },
            "can_id": { "type": "integer", "minimum": 0 },
            "message": { "type": "string" },
            "signal": { "type": "string" },
            "raw": {
                "oneOf": [
                    variant("bool", json!({ "type": "boolean" })),
                    variant("int", json!({ "type": "integer" })),
                    variant("uint", json!({ "type": "integer", "minimum": 0 })),
                    variant("float", json!({ "type": ["number", "null"] })),
                    variant("bytes", json!({
                        "type": "array",
                        "items": { "type": "integer", "minimum": 0, "maximum": 255 }
                    }))
                ]
            },
            "physical": { "type": "number" },
            "description": { "type": "string" },
            "unit": { "type": "string" }
        },
        "required": ["timestamp_ns", "can_id", "message", "signal", "raw"]
    })
}

/// Schema bytes as written to the container
pub fn schema_bytes(name: &str) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&json_schema(name))?)
}
