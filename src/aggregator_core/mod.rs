//! Aggregator Core - rolling window aggregation for machine readings
//!
//! # Architecture
//!
//! ```text
//! Payload (MQTT JSON) → Reading::from_payload (normalizer)
//!     ↓
//! AggregationBuffer::add (retained readings)
//!     ↓
//! AggregationBuffer::compute (evict < now - window, group, sort)
//!     ↓
//! Vec<AggregateRow> → AggregateSink
//! ```

pub mod normalizer;
pub mod payload;
pub mod window;

pub use normalizer::{IngestError, Reading};
pub use payload::{Payload, PayloadError, PayloadValue};
pub use window::{lock_buffer, AddOutcome, AggregateRow, AggregationBuffer, DEFAULT_WINDOW_SECS};
