use crate::aggregator_core::Payload;
use crate::config::MqttConfig;
use crate::mqtt::error_handler::{ExponentialBackoff, MaxRetriesExceeded};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;

const KEEP_ALIVE_SECS: u64 = 30;
const REQUEST_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug)]
pub enum ClientError {
    /// Could not establish a session with the broker
    Connection(String),
    /// An established session was lost
    Disconnected(String),
    Subscribe(String),
    MaxRetries,
}

impl From<MaxRetriesExceeded> for ClientError {
    fn from(_: MaxRetriesExceeded) -> Self {
        ClientError::MaxRetries
    }
}

impl From<rumqttc::ClientError> for ClientError {
    fn from(err: rumqttc::ClientError) -> Self {
        ClientError::Subscribe(err.to_string())
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ClientError::Disconnected(msg) => write!(f, "Disconnected from broker: {}", msg),
            ClientError::Subscribe(msg) => write!(f, "Subscribe failed: {}", msg),
            ClientError::MaxRetries => write!(f, "Maximum retry attempts exceeded"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Build MQTT client options from configuration
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id.clone(), config.broker.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(KEEP_ALIVE_SECS));
    options
}

/// Decode one publish body. Failures are logged and yield `None`.
pub fn decode_message(topic: &str, body: &[u8]) -> Option<Payload> {
    match Payload::from_slice(body) {
        Ok(payload) => {
            log::debug!("[{}] {:?}", topic, payload);
            Some(payload)
        }
        Err(e) => {
            log::error!(
                "Failed to decode message on {}: {} - {}",
                topic,
                String::from_utf8_lossy(body),
                e
            );
            None
        }
    }
}

/// Subscribes to the configured topic and forwards decoded payloads
pub struct MqttSubscriber {
    config: MqttConfig,
}

impl MqttSubscriber {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    /// Run one broker session.
    ///
    /// Returns `Ok(())` once the receiving side of `tx` is closed, which is how
    /// shutdown reaches the subscriber.
    pub async fn run(&self, tx: &mpsc::Sender<Payload>) -> Result<(), ClientError> {
        log::info!(
            "🔌 Connecting to MQTT broker at {}:{}...",
            self.config.broker,
            self.config.port
        );

        let (client, mut eventloop) =
            AsyncClient::new(mqtt_options(&self.config), REQUEST_CHANNEL_CAPACITY);
        client.subscribe(self.config.topic.as_str(), QoS::AtMostOnce).await?;

        let mut connected = false;

        loop {
            let event = tokio::select! {
                event = eventloop.poll() => event,
                _ = tx.closed() => {
                    log::info!("Payload channel closed, leaving MQTT session");
                    let _ = client.try_disconnect();
                    return Ok(());
                }
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected = true;
                    log::info!("✅ Connected to MQTT broker");
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    log::info!("✅ Subscribed to topic: {}", self.config.topic);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let Some(payload) = decode_message(&publish.topic, &publish.payload) else {
                        continue;
                    };
                    if tx.send(payload).await.is_err() {
                        log::info!("Payload channel closed, leaving MQTT session");
                        let _ = client.try_disconnect();
                        return Ok(());
                    }
                }
                Ok(_) => {}
                Err(e) if connected => return Err(ClientError::Disconnected(e.to_string())),
                Err(e) => return Err(ClientError::Connection(e.to_string())),
            }
        }
    }
}

/// Keep a subscriber session alive, reconnecting with backoff after failures.
///
/// Only returns once the payload channel is closed or retries run out.
pub async fn run_with_reconnect(
    config: MqttConfig,
    tx: mpsc::Sender<Payload>,
) -> Result<(), ClientError> {
    let mut backoff = ExponentialBackoff::new(
        config.retry_delay_secs,
        config.retry_max_delay_secs,
        None,
    );
    let subscriber = MqttSubscriber::new(config);

    loop {
        match subscriber.run(&tx).await {
            Ok(()) => {
                log::info!("✅ MQTT subscriber stopped gracefully");
                return Ok(());
            }
            Err(ClientError::Disconnected(msg)) => {
                log::error!("❌ MQTT connection lost: {}. Reconnecting...", msg);
                backoff.reset();
                backoff.sleep().await?;
            }
            Err(e) => {
                log::error!("❌ MQTT connection error: {}", e);
                backoff.sleep().await?;
            }
        }
    }
}
