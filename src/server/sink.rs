//! Sink trait for delivering aggregate rows downstream

use crate::aggregator_core::AggregateRow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug)]
pub enum SinkError {
    Serialization(serde_json::Error),
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialization(err)
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

/// Receives every computed aggregate snapshot
#[async_trait]
pub trait AggregateSink: Send + Sync {
    /// Deliver one snapshot; returns how many subscribers it reached
    async fn publish(&self, rows: &[AggregateRow], at: DateTime<Utc>) -> Result<usize, SinkError>;

    /// Get sink type for logging
    fn sink_type(&self) -> &'static str;
}
