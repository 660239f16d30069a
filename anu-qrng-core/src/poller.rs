//! Long-running polling loop
//!
//! The loop has two states. While `Polling` it runs one fetch cycle, then waits the cycle
//! interval whatever the outcome. Cancelling the shutdown token moves it to `ShuttingDown`,
//! which is terminal: no request is issued after the transition.

use crate::config::PollerConfig;
use crate::fetcher::RetryingFetcher;
use crate::metrics::PollerMetrics;
use crate::retry::{pause, Pause};
use crate::sink::{ErrorSink, ResultsSink};
use crate::transport::Transport;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Polling loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Polling,
    ShuttingDown,
}

/// Drives a [`RetryingFetcher`] at a fixed cadence until shutdown
pub struct PollingLoop<T, R, E> {
    fetcher: RetryingFetcher<T, R, E>,
    cycle_interval: Duration,
    metrics: PollerMetrics,
    state: LoopState,
}

impl<T, R, E> PollingLoop<T, R, E>
where
    T: Transport,
    R: ResultsSink,
    E: ErrorSink,
{
    pub fn new(fetcher: RetryingFetcher<T, R, E>, config: &PollerConfig) -> Self {
        let metrics = fetcher.metrics().clone();
        Self {
            fetcher,
            cycle_interval: config.cycle_interval,
            metrics,
            state: LoopState::Polling,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn metrics(&self) -> &PollerMetrics {
        &self.metrics
    }

    /// Run cycles until `cancel` fires
    ///
    /// Returns once the loop reached [`LoopState::ShuttingDown`].
    pub async fn run(&mut self, cancel: &CancellationToken) -> LoopState {
        info!(
            "Polling {} every {} seconds ({} attempts per cycle, {} seconds between attempts)",
            self.fetcher.endpoint(),
            self.cycle_interval.as_secs_f64(),
            self.fetcher.policy().max_attempts,
            self.fetcher.policy().delay.as_secs_f64()
        );

        while self.state == LoopState::Polling {
            if cancel.is_cancelled() {
                self.shut_down();
                break;
            }

            let fetched = self.fetcher.fetch_with_retry(cancel).await.is_some();
            if cancel.is_cancelled() {
                self.shut_down();
                break;
            }

            self.metrics.record_cycle(fetched);
            if fetched {
                info!(
                    "Sleeping for {} seconds before next request...",
                    self.cycle_interval.as_secs_f64()
                );
            } else {
                warn!(
                    "Failed to get a valid response after {} attempts. Sleeping for {} seconds before next request...",
                    self.fetcher.policy().max_attempts,
                    self.cycle_interval.as_secs_f64()
                );
            }

            if pause(self.cycle_interval, cancel).await == Pause::Cancelled {
                self.shut_down();
            }
        }

        self.state
    }

    fn shut_down(&mut self) {
        self.state = LoopState::ShuttingDown;
        info!("Shutting down... all batches are already persisted.");
        info!("Final counters: {}", self.metrics.summary());
    }
}
