//! MQTT tap
//!
//! Subscribes to the machine topic and logs every decoded payload.
//! Useful for checking what the simulator or real machines publish.
//!
//! Usage:
//!   cargo run --bin mqtt_tap
//!
//! Environment variables:
//!   MQTT_BROKER / MQTT_PORT / MQTT_TOPIC - broker and subscription
//!   RUST_LOG - Logging level (optional, default: info)

use dotenv::dotenv;
use log::{error, info};
use scrapflow::aggregator_core::{Payload, Reading};
use scrapflow::config::MqttConfig;
use scrapflow::mqtt::run_with_reconnect;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    scrapflow::init_logging("info");

    let config = MqttConfig::from_env()?;
    info!("👂 Tapping {} on {}:{}", config.topic, config.broker, config.port);

    let (tx, mut rx) = mpsc::channel::<Payload>(1000);
    let subscriber = tokio::spawn(run_with_reconnect(config, tx));

    loop {
        tokio::select! {
            maybe_payload = rx.recv() => {
                let Some(payload) = maybe_payload else { break };
                match Reading::from_payload(&payload, chrono::Utc::now()) {
                    Ok(Some(reading)) => info!(
                        "📥 {} index={} value={} at {}",
                        reading.machine_id, reading.sensor_index, reading.value, reading.timestamp
                    ),
                    Ok(None) => info!("📥 incomplete: {:?}", payload),
                    Err(e) => error!("❌ invalid payload {:?}: {}", payload, e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("⚠️  Received CTRL+C, stopping tap");
                break;
            }
        }
    }

    subscriber.abort();
    Ok(())
}
