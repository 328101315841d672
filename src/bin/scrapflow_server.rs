//! Aggregation server
//!
//! Subscribes to machine readings over MQTT, keeps the rolling window and
//! pushes aggregates to WebSocket dashboards.
//!
//! Usage:
//!   cargo run --release --bin scrapflow_server
//!
//! Environment variables:
//!   MQTT_BROKER / MQTT_PORT / MQTT_TOPIC - broker and subscription (default: localhost:1883, machines/+/scrap)
//!   WINDOW_SECONDS - rolling window length (default: 60)
//!   MAX_BUFFERED_READINGS - optional cap on retained readings (default: unlimited)
//!   BROADCAST_INTERVAL_MS - 0 = after every message (default: 0)
//!   HTTP_HOST / HTTP_PORT - dashboard bind address (default: 0.0.0.0:8000)
//!   FRONTEND_DIR - dashboard files (default: frontend)
//!   RUST_LOG - Logging level (optional, default: info)

use dotenv::dotenv;
use log::{error, info, warn};
use scrapflow::aggregator_core::{AggregationBuffer, Payload};
use scrapflow::config::{BroadcastMode, ServiceConfig};
use scrapflow::mqtt::run_with_reconnect;
use scrapflow::pipeline::start_ingestion;
use scrapflow::server::{self, AggregateSink, AppState, BroadcastHub};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

const DRAIN_TIMEOUT_SECS: u64 = 5;

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = ServiceConfig::from_env()?;
    scrapflow::init_logging(&config.rust_log);

    info!("🚀 Starting scrapflow aggregation server");
    info!("   ├─ MQTT: {}:{} ({})", config.mqtt.broker, config.mqtt.port, config.mqtt.topic);
    info!("   ├─ Window: {}s", config.window_secs);
    match config.max_buffered_readings {
        Some(max) => info!("   ├─ Buffer cap: {} readings (drop oldest)", max),
        None => info!("   ├─ Buffer cap: none"),
    }
    match config.broadcast_mode {
        BroadcastMode::EveryMessage => info!("   ├─ Broadcast: after every message"),
        BroadcastMode::Periodic(period) => info!("   ├─ Broadcast: every {}ms", period.as_millis()),
    }
    info!("   └─ HTTP: http://{}", config.http_addr());

    let buffer = Arc::new(Mutex::new(
        AggregationBuffer::new(config.window_secs).with_max_readings(config.max_buffered_readings),
    ));
    let hub = Arc::new(BroadcastHub::default());

    let (tx, rx) = mpsc::channel::<Payload>(config.channel_buffer);

    let sink: Arc<dyn AggregateSink> = hub.clone();
    let ingestion = tokio::spawn(start_ingestion(
        rx,
        buffer.clone(),
        sink,
        config.broadcast_mode,
    ));

    info!("📡 Starting MQTT subscriber task...");
    let subscriber = tokio::spawn(run_with_reconnect(config.mqtt.clone(), tx));

    let listener = TcpListener::bind(config.http_addr()).await?;
    info!("✅ Dashboard listening on http://{}", config.http_addr());
    info!("   ├─ GET /           dashboard");
    info!("   ├─ GET /ws         aggregate feed");
    info!("   └─ GET /api/health health check");

    let state = AppState {
        hub,
        buffer,
        frontend_dir: config.frontend_dir.clone(),
    };

    if let Err(e) = server::serve(listener, state, shutdown_signal()).await {
        error!("❌ HTTP server error: {}", e);
    }

    // Stop accepting messages; dropping the subscriber's sender lets ingestion drain
    subscriber.abort();
    match subscriber.await {
        Ok(Err(e)) => warn!("MQTT subscriber ended with error: {}", e),
        Ok(Ok(())) => {}
        Err(e) if e.is_cancelled() => info!("MQTT subscriber task cancelled"),
        Err(e) => warn!("MQTT subscriber task failed: {}", e),
    }

    match timeout(Duration::from_secs(DRAIN_TIMEOUT_SECS), ingestion).await {
        Ok(Ok(stats)) => info!("✅ Ingestion drained ({} payloads total)", stats.received),
        Ok(Err(e)) => error!("❌ Ingestion task failed: {}", e),
        Err(_) => warn!("⚠️  Ingestion did not drain within {}s", DRAIN_TIMEOUT_SECS),
    }

    info!("✅ scrapflow stopped");
    Ok(())
}
