//! Pipeline ingestion - async channel processor for decoded payloads
//!
//! Each payload is validated into the shared buffer. Depending on the
//! broadcast mode, aggregates are recomputed after every message or on a timer,
//! and every snapshot with at least one row is handed to the sink.

use crate::aggregator_core::{lock_buffer, AddOutcome, AggregateRow, AggregationBuffer, Payload};
use crate::config::BroadcastMode;
use crate::server::AggregateSink;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

const THROUGHPUT_LOG_SECS: u64 = 10;
/// `interval` panics on a zero period
const MIN_BROADCAST_PERIOD: Duration = Duration::from_millis(1);

/// Counters reported when ingestion stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub received: u64,
    pub stored: u64,
    pub incomplete: u64,
    pub rejected: u64,
    pub snapshots_published: u64,
}

fn ingest_one(buffer: &mut AggregationBuffer, payload: &Payload, stats: &mut IngestionStats) {
    stats.received += 1;
    match buffer.add(payload) {
        Ok(AddOutcome::Stored) => stats.stored += 1,
        Ok(AddOutcome::Incomplete) => {
            stats.incomplete += 1;
            log::debug!("Skipping incomplete payload: {:?}", payload);
        }
        Err(e) => {
            stats.rejected += 1;
            log::warn!("⚠️  Dropping payload: {}", e);
        }
    }
}

async fn publish(sink: &dyn AggregateSink, rows: &[AggregateRow], stats: &mut IngestionStats) {
    if rows.is_empty() {
        return;
    }

    match sink.publish(rows, Utc::now()).await {
        Ok(reached) => {
            stats.snapshots_published += 1;
            log::debug!(
                "📤 Published {} rows to {} {} subscribers",
                rows.len(),
                reached,
                sink.sink_type()
            );
        }
        Err(e) => log::error!("❌ Failed to publish aggregates: {}", e),
    }
}

/// Start ingestion from the payload channel.
///
/// Runs until every sender is dropped. Payloads already queued are still
/// processed, followed by one final compute and publish.
pub async fn start_ingestion(
    mut rx: mpsc::Receiver<Payload>,
    buffer: Arc<Mutex<AggregationBuffer>>,
    sink: Arc<dyn AggregateSink>,
    mode: BroadcastMode,
) -> IngestionStats {
    let (periodic, period) = match mode {
        BroadcastMode::EveryMessage => (false, Duration::from_secs(3600)),
        BroadcastMode::Periodic(period) => (true, period.max(MIN_BROADCAST_PERIOD)),
    };

    log::info!("🚀 Starting ingestion");
    match mode {
        BroadcastMode::EveryMessage => log::info!("   └─ Broadcast: after every message"),
        BroadcastMode::Periodic(period) => {
            log::info!("   └─ Broadcast: every {}ms", period.as_millis())
        }
    }

    let mut flush_timer = interval(period);
    flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut stats = IngestionStats::default();
    let mut window_count = 0u64;
    let mut last_log_time = Instant::now();

    loop {
        tokio::select! {
            maybe_payload = rx.recv() => {
                let Some(payload) = maybe_payload else {
                    log::warn!("⚠️  Payload channel closed, stopping ingestion");
                    break;
                };

                // Add and compute under one lock acquisition
                let rows = {
                    let mut guard = lock_buffer(&buffer);
                    ingest_one(&mut guard, &payload, &mut stats);
                    (!periodic).then(|| guard.compute())
                };

                if let Some(rows) = rows {
                    publish(sink.as_ref(), &rows, &mut stats).await;
                }

                window_count += 1;
                if last_log_time.elapsed().as_secs() >= THROUGHPUT_LOG_SECS {
                    let per_sec = window_count as f64 / last_log_time.elapsed().as_secs_f64();
                    let overflow = lock_buffer(&buffer).overflow_dropped();
                    log::info!(
                        "📊 Ingestion rate: {:.1} msg/sec (total: {}, rejected: {}, overflow dropped: {})",
                        per_sec,
                        stats.received,
                        stats.rejected,
                        overflow
                    );
                    last_log_time = Instant::now();
                    window_count = 0;
                }
            }

            _ = flush_timer.tick(), if periodic => {
                let rows = lock_buffer(&buffer).compute();
                publish(sink.as_ref(), &rows, &mut stats).await;
            }
        }
    }

    log::info!("🔄 Performing final flush...");
    let rows = lock_buffer(&buffer).compute();
    publish(sink.as_ref(), &rows, &mut stats).await;

    log::info!(
        "✅ Ingestion stopped: {} received, {} stored, {} incomplete, {} rejected",
        stats.received,
        stats.stored,
        stats.incomplete,
        stats.rejected
    );
    stats
}
