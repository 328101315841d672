//! Loosely-typed message payloads as they arrive from the broker

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;

/// One field value inside a decoded payload
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Zone-aware instant (already UTC)
    Instant(DateTime<Utc>),
    /// Instant without zone information, interpreted as UTC
    NaiveInstant(NaiveDateTime),
    /// Arrays and objects; never valid for any recognized field
    Nested(serde_json::Value),
}

impl PayloadValue {
    /// Null or a whitespace-only string
    pub fn is_blank(&self) -> bool {
        match self {
            PayloadValue::Null => true,
            PayloadValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for PayloadValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PayloadValue::Null,
            serde_json::Value::Bool(b) => PayloadValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => PayloadValue::Int(i),
                None => PayloadValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => PayloadValue::Text(s),
            other => PayloadValue::Nested(other),
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::Text(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::Text(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Int(value)
    }
}

impl From<i32> for PayloadValue {
    fn from(value: i32) -> Self {
        PayloadValue::Int(i64::from(value))
    }
}

impl From<f64> for PayloadValue {
    fn from(value: f64) -> Self {
        PayloadValue::Float(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for PayloadValue {
    fn from(value: DateTime<Utc>) -> Self {
        PayloadValue::Instant(value)
    }
}

impl From<NaiveDateTime> for PayloadValue {
    fn from(value: NaiveDateTime) -> Self {
        PayloadValue::NaiveInstant(value)
    }
}

#[derive(Debug)]
pub enum PayloadError {
    Json(serde_json::Error),
    NotAnObject,
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        PayloadError::Json(err)
    }
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadError::Json(e) => write!(f, "Failed to decode JSON: {}", e),
            PayloadError::NotAnObject => write!(f, "Payload is not a JSON object"),
        }
    }
}

impl std::error::Error for PayloadError {}

/// Decoded key/value mapping for one message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: HashMap<String, PayloadValue>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<PayloadValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<PayloadValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.fields.get(key)
    }

    /// Return the first present value among `keys`, in order.
    /// Null and blank strings count as absent.
    pub fn get_first(&self, keys: &[&str]) -> Option<&PayloadValue> {
        keys.iter()
            .filter_map(|key| self.fields.get(*key))
            .find(|value| !value.is_blank())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a payload from raw message bytes (must be a JSON object)
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PayloadError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Self::from_json(value)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, PayloadError> {
        match value {
            serde_json::Value::Object(map) => Ok(Self {
                fields: map
                    .into_iter()
                    .map(|(key, value)| (key, PayloadValue::from(value)))
                    .collect(),
            }),
            _ => Err(PayloadError::NotAnObject),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simulator_message() {
        let line = br#"{"maschinenId":"A1","scrapeIndex":2,"value":3.41,"zeitstempel":"2024-05-01T10:00:00Z"}"#;

        let payload = Payload::from_slice(line).unwrap();
        assert_eq!(payload.len(), 4);
        assert_eq!(payload.get("maschinenId"), Some(&PayloadValue::Text("A1".to_string())));
        assert_eq!(payload.get("scrapeIndex"), Some(&PayloadValue::Int(2)));
        assert_eq!(payload.get("value"), Some(&PayloadValue::Float(3.41)));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            Payload::from_slice(b"[1, 2, 3]"),
            Err(PayloadError::NotAnObject)
        ));
        assert!(matches!(
            Payload::from_slice(br#"{"invalid": "json"#),
            Err(PayloadError::Json(_))
        ));
    }

    #[test]
    fn test_get_first_skips_null() {
        let payload = Payload::new()
            .with("machineId", PayloadValue::Null)
            .with("maschinenId", "B1");

        assert_eq!(
            payload.get_first(&["machineId", "maschinenId"]),
            Some(&PayloadValue::Text("B1".to_string()))
        );
        assert_eq!(payload.get_first(&["missing", "alsoMissing"]), None);
    }

    #[test]
    fn test_get_first_skips_blank_text() {
        let payload = Payload::new()
            .with("timestamp", "   ")
            .with("zeitstempel", "2024-01-01T11:00:00Z");

        assert_eq!(
            payload.get_first(&["timestamp", "zeitstempel"]),
            Some(&PayloadValue::Text("2024-01-01T11:00:00Z".to_string()))
        );
        assert_eq!(payload.get_first(&["timestamp"]), None);
    }
}
