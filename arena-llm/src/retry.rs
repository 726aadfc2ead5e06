//! Exponential backoff for retriable gateway errors

use arena_core::{GatewayConfig, GatewayError};
use std::time::Duration;

/// Backoff state for one logical call.
///
/// Delays start at the configured initial value and double per retry up to
/// the cap. The attempt counter resets whenever the call makes observable
/// progress (a successful delta), so a long stream with intermittent
/// provider hiccups is not charged for earlier recoveries.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    max_retries: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            initial: config.initial_backoff,
            max: config.max_backoff,
            max_retries: config.max_retries,
            attempt: 0,
        }
    }

    /// The delay to sleep before the next attempt, or `None` when the error
    /// is not retriable or the retry budget is spent.
    pub fn next_delay(&mut self, error: &GatewayError) -> Option<Duration> {
        if !error.is_retriable() || self.attempt >= self.max_retries {
            return None;
        }
        let exp = self.attempt.min(31);
        let delay = self
            .initial
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max)
            .min(self.max);
        self.attempt += 1;
        Some(delay)
    }

    /// Reset the attempt counter after observable progress.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

/// Run `operation` with backoff until it succeeds, exhausts the retry
/// budget, or hits a non-retriable error.
pub async fn with_retries<T, F, Fut>(config: &GatewayConfig, mut operation: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, GatewayError>>,
{
    let mut backoff = Backoff::new(config);
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => match backoff.next_delay(&error) {
                Some(delay) => {
                    tracing::debug!(
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "Retrying gateway call"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(error),
            },
        }
    }
}
