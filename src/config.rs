use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// How often aggregates are recomputed and pushed to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastMode {
    /// Recompute and broadcast after every ingested message
    EveryMessage,
    /// Recompute and broadcast on a fixed interval, decoupled from ingestion rate
    Periodic(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub retry_delay_secs: u64,
    pub retry_max_delay_secs: u64,
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub mqtt: MqttConfig,
    pub window_secs: u64,
    pub max_buffered_readings: Option<usize>,
    pub broadcast_mode: BroadcastMode,
    pub http_host: String,
    pub http_port: u16,
    pub frontend_dir: PathBuf,
    pub channel_buffer: usize,
    pub rust_log: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(format!("{} must be a number, got '{}'", key, raw))
        }),
        _ => Ok(default),
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `MQTT_BROKER` (default: localhost)
    /// - `MQTT_PORT` (default: 1883)
    /// - `MQTT_TOPIC` (default: machines/+/scrap)
    /// - `MQTT_CLIENT_ID` (default: scrapflow-server)
    /// - `WINDOW_SECONDS` (default: 60)
    /// - `MAX_BUFFERED_READINGS` (default: unlimited)
    /// - `BROADCAST_INTERVAL_MS` (default: 0, broadcast after every message)
    /// - `HTTP_HOST` / `HTTP_PORT` (default: 0.0.0.0 / 8000)
    /// - `FRONTEND_DIR` (default: frontend)
    /// - `STREAMER_CHANNEL_BUFFER` (default: 10000)
    /// - `RETRY_DELAY_SECS` / `RETRY_MAX_DELAY_SECS` (default: 5 / 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let window_secs: u64 = parse_or(&lookup, "WINDOW_SECONDS", 60)?;
        if window_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "WINDOW_SECONDS must be greater than 0".to_string(),
            ));
        }

        let max_buffered_readings = match lookup("MAX_BUFFERED_READINGS") {
            Some(raw) if !raw.trim().is_empty() => {
                let max: usize = raw.trim().parse().map_err(|_| {
                    ConfigError::InvalidValue(format!(
                        "MAX_BUFFERED_READINGS must be a number, got '{}'",
                        raw
                    ))
                })?;
                if max == 0 {
                    return Err(ConfigError::InvalidValue(
                        "MAX_BUFFERED_READINGS must be greater than 0".to_string(),
                    ));
                }
                Some(max)
            }
            _ => None,
        };

        let broadcast_interval_ms: u64 = parse_or(&lookup, "BROADCAST_INTERVAL_MS", 0)?;
        let broadcast_mode = if broadcast_interval_ms == 0 {
            BroadcastMode::EveryMessage
        } else {
            BroadcastMode::Periodic(Duration::from_millis(broadcast_interval_ms))
        };

        let channel_buffer: usize = parse_or(&lookup, "STREAMER_CHANNEL_BUFFER", 10_000)?;
        if channel_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "STREAMER_CHANNEL_BUFFER must be greater than 0".to_string(),
            ));
        }

        let retry_delay_secs: u64 = parse_or(&lookup, "RETRY_DELAY_SECS", 5)?;
        let retry_max_delay_secs: u64 =
            parse_or(&lookup, "RETRY_MAX_DELAY_SECS", retry_delay_secs)?;

        Ok(Self {
            mqtt: MqttConfig {
                broker: text("MQTT_BROKER", "localhost"),
                port: parse_or(&lookup, "MQTT_PORT", 1883)?,
                topic: text("MQTT_TOPIC", "machines/+/scrap"),
                client_id: text("MQTT_CLIENT_ID", "scrapflow-server"),
                retry_delay_secs,
                retry_max_delay_secs: retry_max_delay_secs.max(retry_delay_secs),
            },
            window_secs,
            max_buffered_readings,
            broadcast_mode,
            http_host: text("HTTP_HOST", "0.0.0.0"),
            http_port: parse_or(&lookup, "HTTP_PORT", 8000)?,
            frontend_dir: PathBuf::from(text("FRONTEND_DIR", "frontend")),
            channel_buffer,
            rust_log: text("RUST_LOG", "info"),
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl MqttConfig {
    /// Broker settings only, for the standalone binaries
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServiceConfig::from_env()?.mqtt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.mqtt.broker, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic, "machines/+/scrap");
        assert_eq!(config.mqtt.retry_delay_secs, 5);
        assert_eq!(config.mqtt.retry_max_delay_secs, 5);
        assert_eq!(config.window_secs, 60);
        assert_eq!(config.max_buffered_readings, None);
        assert_eq!(config.broadcast_mode, BroadcastMode::EveryMessage);
        assert_eq!(config.http_addr(), "0.0.0.0:8000");
        assert_eq!(config.frontend_dir, PathBuf::from("frontend"));
        assert_eq!(config.channel_buffer, 10_000);
    }

    #[test]
    fn test_custom_config() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("MQTT_BROKER", "broker.local"),
            ("MQTT_PORT", "8883"),
            ("WINDOW_SECONDS", "300"),
            ("MAX_BUFFERED_READINGS", "5000"),
            ("BROADCAST_INTERVAL_MS", "1000"),
            ("HTTP_PORT", "9000"),
            ("RETRY_DELAY_SECS", "2"),
            ("RETRY_MAX_DELAY_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.mqtt.broker, "broker.local");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.window_secs, 300);
        assert_eq!(config.max_buffered_readings, Some(5000));
        assert_eq!(
            config.broadcast_mode,
            BroadcastMode::Periodic(Duration::from_millis(1000))
        );
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.mqtt.retry_delay_secs, 2);
        assert_eq!(config.mqtt.retry_max_delay_secs, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServiceConfig::from_lookup(lookup_from(&[("WINDOW_SECONDS", "0")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup_from(&[("MQTT_PORT", "not-a-port")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup_from(&[("MAX_BUFFERED_READINGS", "0")])),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
