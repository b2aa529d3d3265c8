use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Broker reconnect policy: 1s doubling to 60s, 10 attempts
pub const DEFAULT_INITIAL_DELAY_SECS: u64 = 1;
pub const DEFAULT_MAX_DELAY_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 10;

#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay: u64,
    max_delay: u64,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug, Error)]
#[error("Maximum retry attempts exceeded")]
pub struct MaxRetriesExceeded;

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_DELAY_SECS, DEFAULT_MAX_DELAY_SECS, DEFAULT_MAX_RETRIES)
    }
}

impl ExponentialBackoff {
    pub fn new(initial: u64, max: u64, retries: u32) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max,
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt, in seconds
    pub fn next_delay(&self) -> u64 {
        let factor = 2_u64.saturating_pow(self.current_attempt);
        std::cmp::min(self.initial_delay.saturating_mul(factor), self.max_delay)
    }

    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        if self.current_attempt >= self.max_retries {
            return Err(MaxRetriesExceeded);
        }

        let delay = self.next_delay();

        log::warn!(
            "⏳ Retry attempt {} of {} in {}s",
            self.current_attempt + 1,
            self.max_retries,
            delay
        );

        sleep(Duration::from_secs(delay)).await;
        self.current_attempt += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let mut backoff = ExponentialBackoff::new(1, 60, 10);
        let mut delays = Vec::new();
        for attempt in 0..8 {
            backoff.current_attempt = attempt;
            delays.push(backoff.next_delay());
        }
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);

        backoff.current_attempt = 200;
        assert_eq!(backoff.next_delay(), 60);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let mut backoff = ExponentialBackoff::new(0, 0, 3);
        for _ in 0..3 {
            assert!(backoff.sleep().await.is_ok());
        }
        assert!(backoff.sleep().await.is_err());
        assert_eq!(backoff.attempts(), 3);
    }

    #[tokio::test]
    async fn test_reset_restores_budget() {
        let mut backoff = ExponentialBackoff::new(0, 0, 1);
        backoff.sleep().await.unwrap();
        assert!(backoff.sleep().await.is_err());

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.sleep().await.is_ok());
    }
}
