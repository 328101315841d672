//! JSON frames pushed to dashboard subscribers

use crate::aggregator_core::AggregateRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One aggregate row as dashboards receive it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMessage {
    #[serde(rename = "machineId")]
    pub machine_id: String,
    #[serde(rename = "scrapIndex")]
    pub scrap_index: i64,
    #[serde(rename = "sumLast60s")]
    pub sum_last_60s: f64,
    /// Rounded to 2 decimals for display
    #[serde(rename = "avgLast60s")]
    pub avg_last_60s: f64,
    #[serde(rename = "messageCount")]
    pub message_count: usize,
    /// Broadcast time, UTC with second precision
    pub timestamp: String,
}

impl AggregateMessage {
    pub fn from_row(row: &AggregateRow, at: DateTime<Utc>) -> Self {
        Self {
            machine_id: row.machine_id.clone(),
            scrap_index: row.sensor_index,
            sum_last_60s: row.sum,
            avg_last_60s: round2(row.mean),
            message_count: row.count,
            timestamp: format_timestamp(at),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
