//! Rolling time window buffer and per-key aggregation

use super::normalizer::{IngestError, Reading};
use super::payload::Payload;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Result of a successful `add` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Stored,
    /// Machine id, sensor index or value missing; nothing stored
    Incomplete,
}

/// One aggregated output row for a (machine, sensor index) key
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub machine_id: String,
    pub sensor_index: i64,
    pub sum: f64,
    pub mean: f64,
    pub count: usize,
}

/// Append-only store of recent readings, pruned on every `compute` pass.
///
/// Shared between ingestion and the HTTP surface as `Arc<Mutex<AggregationBuffer>>`;
/// callers hold the lock across add + compute so passes never interleave.
pub struct AggregationBuffer {
    readings: VecDeque<Reading>,
    window_secs: u64,
    max_readings: Option<usize>,
    overflow_dropped: u64,
    now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl AggregationBuffer {
    /// Create a buffer with the given window, using the system clock
    pub fn new(window_secs: u64) -> Self {
        Self::new_with_clock(window_secs, Box::new(Utc::now))
    }

    /// Create a buffer with a custom clock (for deterministic tests)
    pub fn new_with_clock(
        window_secs: u64,
        now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    ) -> Self {
        Self {
            readings: VecDeque::new(),
            window_secs,
            max_readings: None,
            overflow_dropped: 0,
            now_fn,
        }
    }

    /// Cap the retained readings. When full, the oldest reading is dropped.
    pub fn with_max_readings(mut self, max_readings: Option<usize>) -> Self {
        self.max_readings = max_readings;
        self
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Number of readings discarded because of the retained-readings cap
    pub fn overflow_dropped(&self) -> u64 {
        self.overflow_dropped
    }

    /// Validate a payload and append the resulting reading.
    ///
    /// A failed call leaves the buffer untouched.
    pub fn add(&mut self, payload: &Payload) -> Result<AddOutcome, IngestError> {
        let now = (self.now_fn)();
        match Reading::from_payload(payload, now)? {
            Some(reading) => {
                self.push(reading);
                Ok(AddOutcome::Stored)
            }
            None => Ok(AddOutcome::Incomplete),
        }
    }

    /// Append an already validated reading
    pub fn push(&mut self, reading: Reading) {
        if let Some(max) = self.max_readings {
            while self.readings.len() >= max.max(1) {
                self.readings.pop_front();
                self.overflow_dropped += 1;
            }
        }
        self.readings.push_back(reading);
    }

    /// Evict expired readings and aggregate the rest, using the buffer clock
    pub fn compute(&mut self) -> Vec<AggregateRow> {
        let now = (self.now_fn)();
        self.compute_at(now)
    }

    /// Evict readings older than `now - window` and aggregate the remainder.
    ///
    /// Rows are sorted by machine id, then sensor index.
    pub fn compute_at(&mut self, now: DateTime<Utc>) -> Vec<AggregateRow> {
        let window = i64::try_from(self.window_secs).unwrap_or(i64::MAX);
        let cutoff = Duration::try_seconds(window)
            .and_then(|w| now.checked_sub_signed(w))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        self.readings.retain(|r| r.timestamp >= cutoff);

        if self.readings.is_empty() {
            return Vec::new();
        }

        let mut groups: BTreeMap<(&str, i64), (f64, usize)> = BTreeMap::new();
        for reading in &self.readings {
            let entry = groups
                .entry((reading.machine_id.as_str(), reading.sensor_index))
                .or_insert((0.0, 0));
            entry.0 += reading.value;
            entry.1 += 1;
        }

        groups
            .into_iter()
            .map(|((machine_id, sensor_index), (sum, count))| AggregateRow {
                machine_id: machine_id.to_string(),
                sensor_index,
                sum,
                mean: sum / count as f64,
                count,
            })
            .collect()
    }
}

impl Default for AggregationBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS)
    }
}

/// Lock the shared buffer; a panicked holder cannot leave a partial reading behind
pub fn lock_buffer(buffer: &Mutex<AggregationBuffer>) -> MutexGuard<'_, AggregationBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}
