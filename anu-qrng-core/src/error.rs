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

//! Error types for the poller
//!
//! Provides a unified error taxonomy using `thiserror` for ergonomic error handling.
//! Per-attempt failures observed while polling are not errors in this sense; they are
//! classified as [`FailureReason`](crate::protocol::FailureReason) and never leave the
//! fetcher.

pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for setup and persistence operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client could not be built or used
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
