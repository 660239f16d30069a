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

//! ANU QRNG Core Library
//!
//! This crate provides the types and the polling machinery behind the ANU QRNG poller.
//! The poller periodically fetches hexadecimal random tokens from the ANU quantum random
//! number API, appends every successful response to a newline-delimited JSON file and
//! records every failed attempt in a plain-text error log.
//!
//! # Architecture
//!
//! The library is organized into modules representing core concerns:
//! - `protocol`: API response model and attempt classification
//! - `config`: Fixed polling parameters with validation
//! - `transport`: HTTP seam and its `reqwest` implementation
//! - `sink`: Append-only results store and error log
//! - `retry`: Fixed-delay retry schedule with cancellable pauses
//! - `fetcher`: One attempt cycle against the remote endpoint
//! - `poller`: The long-running polling state machine
//! - `metrics`: Process-wide counters
//! - `error`: Unified error types
//!
//! # Design Principles
//!
//! 1. **Sequential**: one cycle at a time, attempts strictly ordered
//! 2. **Contained failures**: nothing observed while polling is fatal
//! 3. **Cancellable**: every suspension point observes the shutdown token
//! 4. **Testability**: transport and sinks are injected behind traits

pub mod config;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod poller;
pub mod protocol;
pub mod retry;
pub mod sink;
pub mod transport;

pub use error::{Error, Result};
pub use protocol::{FailureReason, FetchAttemptResult, RandomBatch};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
