//! Payload normalization into validated `Reading`s

use super::payload::{Payload, PayloadValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accepted spellings per field, preferred spelling first
pub const MACHINE_ID_KEYS: [&str; 2] = ["machineId", "maschinenId"];
pub const SENSOR_INDEX_KEYS: [&str; 2] = ["scrapIndex", "scrapeIndex"];
pub const VALUE_KEYS: [&str; 2] = ["value", "wert"];
pub const TIMESTAMP_KEYS: [&str; 2] = ["timestamp", "zeitstempel"];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// One validated sensor data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub machine_id: String,
    pub sensor_index: i64,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestError {
    MalformedTimestamp(String),
    InvalidValue(String),
    InvalidMachineId(String),
    InvalidSensorIndex(String),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::MalformedTimestamp(raw) => write!(f, "Malformed timestamp: {}", raw),
            IngestError::InvalidValue(raw) => write!(f, "Value is not numeric: {}", raw),
            IngestError::InvalidMachineId(raw) => write!(f, "Invalid machine id: {}", raw),
            IngestError::InvalidSensorIndex(raw) => write!(f, "Invalid sensor index: {}", raw),
        }
    }
}

impl std::error::Error for IngestError {}

impl Reading {
    /// Build a reading from a payload.
    ///
    /// Returns `Ok(None)` when machine id, sensor index or value is absent under
    /// both spellings. `now` is used when the payload carries no timestamp.
    pub fn from_payload(payload: &Payload, now: DateTime<Utc>) -> Result<Option<Self>, IngestError> {
        let (Some(machine), Some(index), Some(value)) = (
            payload.get_first(&MACHINE_ID_KEYS),
            payload.get_first(&SENSOR_INDEX_KEYS),
            payload.get_first(&VALUE_KEYS),
        ) else {
            return Ok(None);
        };

        let Some(machine_id) = machine_id_of(machine)? else {
            return Ok(None);
        };
        let sensor_index = sensor_index_of(index)?;
        let value = value_of(value)?;
        let timestamp = match payload.get_first(&TIMESTAMP_KEYS) {
            Some(raw) => timestamp_of(raw)?.unwrap_or(now),
            None => now,
        };

        Ok(Some(Self {
            machine_id,
            sensor_index,
            value,
            timestamp,
        }))
    }
}

fn describe(value: &PayloadValue) -> String {
    match value {
        PayloadValue::Text(s) => format!("{:?}", s),
        other => format!("{:?}", other),
    }
}

/// Empty ids are treated as missing
fn machine_id_of(value: &PayloadValue) -> Result<Option<String>, IngestError> {
    let id = match value {
        PayloadValue::Text(s) => s.trim().to_string(),
        PayloadValue::Int(i) => i.to_string(),
        other => return Err(IngestError::InvalidMachineId(describe(other))),
    };
    Ok((!id.is_empty()).then_some(id))
}

fn sensor_index_of(value: &PayloadValue) -> Result<i64, IngestError> {
    match value {
        PayloadValue::Int(i) => Ok(*i),
        PayloadValue::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(*f as i64),
        PayloadValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| IngestError::InvalidSensorIndex(describe(value))),
        other => Err(IngestError::InvalidSensorIndex(describe(other))),
    }
}

fn value_of(value: &PayloadValue) -> Result<f64, IngestError> {
    let parsed = match value {
        PayloadValue::Int(i) => *i as f64,
        PayloadValue::Float(f) => *f,
        PayloadValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| IngestError::InvalidValue(describe(value)))?,
        other => return Err(IngestError::InvalidValue(describe(other))),
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(IngestError::InvalidValue(describe(value)))
    }
}

/// `Ok(None)` for an empty string, which is treated as absent
fn timestamp_of(value: &PayloadValue) -> Result<Option<DateTime<Utc>>, IngestError> {
    match value {
        PayloadValue::Instant(instant) => Ok(Some(*instant)),
        PayloadValue::NaiveInstant(naive) => Ok(Some(naive.and_utc())),
        PayloadValue::Text(s) if s.trim().is_empty() => Ok(None),
        PayloadValue::Text(s) => parse_iso8601(s).map(Some),
        PayloadValue::Int(secs) => DateTime::from_timestamp(*secs, 0)
            .map(Some)
            .ok_or_else(|| IngestError::MalformedTimestamp(describe(value))),
        PayloadValue::Float(secs) if secs.is_finite() => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos)
                .map(Some)
                .ok_or_else(|| IngestError::MalformedTimestamp(describe(value)))
        }
        other => Err(IngestError::MalformedTimestamp(describe(other))),
    }
}

/// Parse an ISO-8601 timestamp, accepting a trailing `Z` for UTC.
/// Strings without an offset are taken as UTC.
pub fn parse_iso8601(raw: &str) -> Result<DateTime<Utc>, IngestError> {
    let trimmed = raw.trim();
    let normalized = match trimmed.strip_suffix('Z').or_else(|| trimmed.strip_suffix('z')) {
        Some(stripped) => format!("{}+00:00", stripped),
        None => trimmed.to_string(),
    };

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(&normalized, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(parsed.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(IngestError::MalformedTimestamp(raw.to_string()))
}
