//! Test-data generator publishing random machine readings

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

pub const MACHINES: [&str; 3] = ["A1", "B1", "C1"];
pub const INDICES: [i64; 3] = [1, 2, 3];
pub const TOPIC_PREFIX: &str = "machines";

/// Simulated message, using the German field spelling
#[derive(Debug, Clone, Serialize)]
pub struct SimulatedReading {
    #[serde(rename = "maschinenId")]
    pub machine_id: String,
    #[serde(rename = "scrapeIndex")]
    pub scrap_index: i64,
    pub value: f64,
    pub zeitstempel: String,
}

impl SimulatedReading {
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let machine_id = MACHINES.choose(rng).copied().unwrap_or(MACHINES[0]);
        let scrap_index = INDICES.choose(rng).copied().unwrap_or(INDICES[0]);
        let value = (rng.gen_range(1.0..5.0_f64) * 100.0).round() / 100.0;

        Self {
            machine_id: machine_id.to_string(),
            scrap_index,
            value,
            zeitstempel: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }

    pub fn topic(&self) -> String {
        format!("{}/{}/scrap", TOPIC_PREFIX, self.machine_id)
    }
}

/// Random pause between published messages
pub fn next_pause<R: Rng>(rng: &mut R) -> Duration {
    Duration::from_secs_f64(rng.gen_range(0.5..2.0))
}
