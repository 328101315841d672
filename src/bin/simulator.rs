//! Machine simulator
//!
//! Publishes random readings for machines A1/B1/C1 using the German field
//! spelling, one message every 0.5-2 seconds.
//!
//! Usage:
//!   cargo run --bin simulator
//!
//! Environment variables:
//!   MQTT_BROKER / MQTT_PORT - broker address (default: localhost:1883)
//!   RUST_LOG - Logging level (optional, default: info)

use dotenv::dotenv;
use log::{error, info, warn};
use rumqttc::{AsyncClient, QoS};
use scrapflow::config::MqttConfig;
use scrapflow::mqtt::mqtt_options;
use scrapflow::simulator::{next_pause, SimulatedReading};

const SIMULATOR_CLIENT_ID: &str = "scrapflow-simulator";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    scrapflow::init_logging("info");

    let mut config = MqttConfig::from_env()?;
    config.client_id = SIMULATOR_CLIENT_ID.to_string();

    info!("🏭 Starting machine simulator");
    info!("   └─ Broker: {}:{}", config.broker, config.port);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options(&config), 10);

    // The event loop must be polled for publishes to leave the client
    let poller = tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                warn!("⚠️  MQTT connection error: {}", e);
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    });

    let mut sent = 0u64;
    loop {
        let (reading, pause) = {
            let mut rng = rand::thread_rng();
            (SimulatedReading::generate(&mut rng), next_pause(&mut rng))
        };

        let body = serde_json::to_vec(&reading)?;
        match client.publish(reading.topic(), QoS::AtMostOnce, false, body).await {
            Ok(()) => {
                sent += 1;
                info!(
                    "📤 #{} {} index={} value={:.2}",
                    sent, reading.machine_id, reading.scrap_index, reading.value
                );
            }
            Err(e) => error!("❌ Publish failed: {}", e),
        }

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("⚠️  Received CTRL+C, stopping simulator");
                break;
            }
        }
    }

    if let Err(e) = client.disconnect().await {
        warn!("Disconnect failed: {}", e);
    }
    poller.abort();

    info!("✅ Simulator stopped after {} messages", sent);
    Ok(())
}
