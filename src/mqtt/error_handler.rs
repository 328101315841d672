use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay: u64,
    max_delay: u64,
    /// `None` retries forever
    max_retries: Option<u32>,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl ExponentialBackoff {
    pub fn new(initial: u64, max: u64, retries: Option<u32>) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max.max(initial),
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Delay in seconds before the next attempt
    pub fn next_delay(&self) -> u64 {
        let factor = 2_u64.checked_pow(self.current_attempt).unwrap_or(u64::MAX);
        std::cmp::min(self.initial_delay.saturating_mul(factor), self.max_delay)
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        if let Some(max) = self.max_retries {
            if self.current_attempt >= max {
                return Err(MaxRetriesExceeded);
            }
        }

        let delay = self.next_delay();

        match self.max_retries {
            Some(max) => log::warn!(
                "⏳ Retry attempt {} of {} in {}s",
                self.current_attempt + 1,
                max,
                delay
            ),
            None => log::warn!("⏳ Retry attempt {} in {}s", self.current_attempt + 1, delay),
        }

        sleep(Duration::from_secs(delay)).await;
        self.current_attempt = self.current_attempt.saturating_add(1);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
