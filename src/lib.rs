//! scrapflow - rolling scrap aggregates from MQTT machine readings
//!
//! Machines publish readings to `machines/<id>/scrap`. The server keeps a
//! trailing window of raw readings, recomputes sum/mean/count per
//! (machine, scrap index) and pushes every snapshot to WebSocket dashboards.

pub mod aggregator_core;
pub mod config;
pub mod mqtt;
pub mod pipeline;
pub mod server;
pub mod simulator;

/// Initialize env_logger with an `info` default, writing to stderr
pub fn init_logging(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}
