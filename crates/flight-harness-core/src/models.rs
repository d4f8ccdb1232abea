//! Telemetry data models.
//!
//! These types represent the decoded records and flight logs that flow
//! through the analysis pipeline. Records are schema-less: each carries a
//! type tag and an open field map, because different message types expose
//! different fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type tags the heuristics and context inference know about.
pub mod message_types {
    pub const GPS_RAW_INT: &str = "GPS_RAW_INT";
    pub const GLOBAL_POSITION_INT: &str = "GLOBAL_POSITION_INT";
    pub const BATTERY_STATUS: &str = "BATTERY_STATUS";
    pub const RC_CHANNELS: &str = "RC_CHANNELS";
    pub const STATUSTEXT: &str = "STATUSTEXT";
}

/// One decoded telemetry record.
///
/// `timestamp` is monotonic within a single file but carries no meaning
/// across files. Fields are serialized under `data` to match the parser
/// output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    pub message_type: String,
    #[serde(rename = "data", default)]
    pub fields: BTreeMap<String, Value>,
}

impl TelemetryMessage {
    pub fn new(timestamp: Option<f64>, message_type: impl Into<String>) -> Self {
        Self {
            timestamp,
            message_type: message_type.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter, mostly useful in tests and adapters.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Raw field value, treating JSON `null` as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Numeric field value. Non-numeric values are treated as absent.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(Value::as_f64)
    }

    /// Text field value; non-string scalars are rendered with their JSON form.
    pub fn text(&self, name: &str) -> Option<String> {
        self.field(name).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn is_type(&self, message_type: &str) -> bool {
        self.message_type == message_type
    }
}

/// Upload metadata recorded alongside a flight log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightLogMetadata {
    pub file_size: u64,
    pub content_type: Option<String>,
    /// Hex-encoded SHA-256 of the uploaded bytes.
    pub sha256: String,
    pub parsed_messages: usize,
    /// `false` when the parser stopped before the end of the input.
    pub complete: bool,
}

/// A stored flight log: identity, upload details, and its ordered records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightLog {
    pub file_id: String,
    pub filename: String,
    pub upload_time: DateTime<Utc>,
    pub metadata: FlightLogMetadata,
    pub messages: Vec<TelemetryMessage>,
}

impl FlightLog {
    /// Lightweight view without the record sequence.
    pub fn info(&self) -> FlightLogInfo {
        FlightLogInfo {
            file_id: self.file_id.clone(),
            filename: self.filename.clone(),
            upload_time: self.upload_time,
            metadata: self.metadata.clone(),
        }
    }
}

/// Flight log metadata without records.
///
/// Returned by store lookups that only need identity and upload details,
/// avoiding a copy of the full record sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightLogInfo {
    pub file_id: String,
    pub filename: String,
    pub upload_time: DateTime<Utc>,
    pub metadata: FlightLogMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_parser_record() {
        let msg: TelemetryMessage = serde_json::from_value(json!({
            "timestamp": 12.5,
            "message_type": "GPS_RAW_INT",
            "data": { "alt": 1200, "fix_type": 3 }
        }))
        .unwrap();
        assert_eq!(msg.timestamp, Some(12.5));
        assert_eq!(msg.number("alt"), Some(1200.0));
        assert_eq!(msg.number("fix_type"), Some(3.0));
    }

    #[test]
    fn test_missing_timestamp_and_data() {
        let msg: TelemetryMessage =
            serde_json::from_value(json!({ "message_type": "HEARTBEAT" })).unwrap();
        assert_eq!(msg.timestamp, None);
        assert!(msg.fields.is_empty());
    }

    #[test]
    fn test_null_and_non_numeric_fields_are_absent() {
        let msg = TelemetryMessage::new(Some(1.0), "BATTERY_STATUS")
            .with_field("temperature", Value::Null)
            .with_field("label", "hot");
        assert_eq!(msg.number("temperature"), None);
        assert_eq!(msg.number("label"), None);
        assert_eq!(msg.text("label").as_deref(), Some("hot"));
    }
}
