// SPDX-License-Identifier: MIT
//
// ANU QRNG Poller: Quantum Random Data Collection Client
// Copyright (c) 2025 Valer Bocan, PhD, CSSLP
// Email: valer.bocan@upt.ro
//
// Department of Computer and Information Technology
// Politehnica University of Timisoara
//
// https://github.com/vbocan/qrng-data-diode

//! Process-wide polling counters

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters shared by the fetcher and the polling loop
#[derive(Clone)]
pub struct PollerMetrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    start_time: Instant,

    // Cycle metrics
    cycles_total: AtomicU64,
    cycles_failed: AtomicU64,

    // Attempt metrics
    attempts_total: AtomicU64,
    attempts_failed: AtomicU64,

    // Persistence metrics
    batches_persisted: AtomicU64,
    tokens_received: AtomicU64,

    last_success: RwLock<Option<DateTime<Utc>>>,
}

impl Default for PollerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PollerMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                start_time: Instant::now(),
                cycles_total: AtomicU64::new(0),
                cycles_failed: AtomicU64::new(0),
                attempts_total: AtomicU64::new(0),
                attempts_failed: AtomicU64::new(0),
                batches_persisted: AtomicU64::new(0),
                tokens_received: AtomicU64::new(0),
                last_success: RwLock::new(None),
            }),
        }
    }

    // Cycle metrics
    pub fn record_cycle(&self, succeeded: bool) {
        self.inner.cycles_total.fetch_add(1, Ordering::Relaxed);
        if succeeded {
            *self.inner.last_success.write() = Some(Utc::now());
        } else {
            self.inner.cycles_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn cycles_total(&self) -> u64 {
        self.inner.cycles_total.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.inner.cycles_failed.load(Ordering::Relaxed)
    }

    // Attempt metrics
    pub fn record_attempt(&self) {
        self.inner.attempts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attempt_failure(&self) {
        self.inner.attempts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attempts_total(&self) -> u64 {
        self.inner.attempts_total.load(Ordering::Relaxed)
    }

    pub fn attempts_failed(&self) -> u64 {
        self.inner.attempts_failed.load(Ordering::Relaxed)
    }

    // Persistence metrics
    pub fn record_batch(&self, tokens: usize) {
        self.inner.batches_persisted.fetch_add(1, Ordering::Relaxed);
        self.inner.tokens_received.fetch_add(tokens as u64, Ordering::Relaxed);
    }

    pub fn batches_persisted(&self) -> u64 {
        self.inner.batches_persisted.load(Ordering::Relaxed)
    }

    pub fn tokens_received(&self) -> u64 {
        self.inner.tokens_received.load(Ordering::Relaxed)
    }

    /// Wall-clock time of the most recent successful cycle
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_success.read()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        let last_success = self
            .last_success()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        format!(
            "cycles={} failed_cycles={} attempts={} failed_attempts={} batches={} tokens={} last_success={} uptime={}s",
            self.cycles_total(),
            self.cycles_failed(),
            self.attempts_total(),
            self.attempts_failed(),
            self.batches_persisted(),
            self.tokens_received(),
            last_success,
            self.uptime_seconds()
        )
    }
}
