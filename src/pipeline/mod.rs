//! # Ingestion pipeline
//!
//! Connects the MQTT subscriber to the aggregation buffer and the broadcast sink.
//!
//! ```text
//! MqttSubscriber → mpsc::Sender<Payload>
//!     ↓
//! start_ingestion (add + compute under one lock)
//!     ↓
//! AggregateSink::publish (BroadcastHub → WebSocket clients)
//! ```
//!
//! Shutdown: dropping every sender ends the loop after queued payloads are
//! processed and one final snapshot is published.

pub mod ingestion;

pub use ingestion::{start_ingestion, IngestionStats};
