use super::sink::{AggregateSink, SinkError};
use super::wire::AggregateMessage;
use crate::aggregator_core::AggregateRow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

pub const DEFAULT_HUB_CAPACITY: usize = 1024;

/// Fan-out of serialized aggregate frames to live WebSocket connections.
///
/// Each connection holds its own receiver; a connection that falls more than
/// the channel capacity behind skips the frames it missed.
pub struct BroadcastHub {
    tx: broadcast::Sender<String>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        let rx = self.tx.subscribe();
        log::info!("Client connected. Total clients: {}", self.clients_connected());
        rx
    }

    pub fn clients_connected(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

#[async_trait]
impl AggregateSink for BroadcastHub {
    async fn publish(&self, rows: &[AggregateRow], at: DateTime<Utc>) -> Result<usize, SinkError> {
        let mut reached = 0;
        for row in rows {
            let frame = AggregateMessage::from_row(row, at).to_json()?;
            // No receivers is not an error: nobody is watching right now
            if let Ok(n) = self.tx.send(frame) {
                reached = reached.max(n);
            }
        }
        Ok(reached)
    }

    fn sink_type(&self) -> &'static str {
        "websocket"
    }
}
