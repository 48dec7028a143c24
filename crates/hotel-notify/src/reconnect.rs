//! Exponential backoff for push channel reconnects.

use std::time::Duration;

use crate::config::ReconnectConfig;

/// Computes the delay before each automatic reconnect and when to stop trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(ReconnectConfig::default())
    }
}

impl From<ReconnectConfig> for ReconnectPolicy {
    fn from(config: ReconnectConfig) -> Self {
        Self::new(
            config.base_delay_ms,
            config.max_delay_ms,
            config.max_attempts,
        )
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            max_attempts,
        }
    }

    /// `min(base * 2^attempt, cap)`, saturating instead of overflowing.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Whether another automatic reconnect may follow `failures` consecutive failed opens.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
