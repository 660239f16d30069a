//! Fixed-delay retry schedule and cancellable pauses

use crate::config::PollerConfig;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Pause between two consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::DEFAULT_MAX_ATTEMPTS,
            delay: crate::config::DEFAULT_RETRY_DELAY,
        }
    }
}

impl From<&PollerConfig> for RetryPolicy {
    fn from(config: &PollerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.retry_delay,
        }
    }
}

impl RetryPolicy {
    /// 1-based attempt numbers of one cycle
    pub fn attempts(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_attempts
    }

    /// Delay to observe after a failed `attempt`, or `None` once attempts are exhausted
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then_some(self.delay)
    }
}

/// Outcome of a [`pause`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// The full duration elapsed
    Elapsed,
    /// The token fired first
    Cancelled,
}

/// Sleep for `duration` unless `cancel` fires first
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Pause {
    if cancel.is_cancelled() {
        return Pause::Cancelled;
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Pause of {:?} interrupted by shutdown", duration);
            Pause::Cancelled
        }
        _ = sleep(duration) => Pause::Elapsed,
    }
}
