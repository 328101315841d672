pub mod client;
pub mod error_handler;

pub use client::{decode_message, mqtt_options, run_with_reconnect, ClientError, MqttSubscriber};
pub use error_handler::{ExponentialBackoff, MaxRetriesExceeded};
