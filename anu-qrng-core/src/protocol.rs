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

//! Data structures exchanged with the ANU QRNG API
//!
//! The API answers `GET /API/jsonI.php?length=N&type=hex16` with a JSON object of the form
//! `{"type": "hex16", "length": N, "size": 1, "data": ["a1b2", ...], "success": true}`.
//! Only `success` and `data` carry meaning for the poller; every other field is kept so that
//! a persisted batch holds the same fields as the body the API sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message carried by [`FailureReason::ApplicationError`] when the API reports `success: false`
pub const SUCCESS_FIELD_FALSE: &str = "Success field is false";

/// One decoded API response containing random hex tokens
///
/// A batch serializes as `success`, `data`, then the remaining fields in key order. The set of
/// fields matches the API body; their order does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireBatch")]
pub struct RandomBatch {
    /// Whether the API considers the request fulfilled
    pub success: bool,

    /// Random tokens, in the order the API returned them
    pub data: Vec<String>,

    /// Remaining response fields (`type`, `length`, `size`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body as sent by the API; `data` may only be absent when `success` is false
#[derive(Deserialize)]
struct WireBatch {
    success: bool,
    data: Option<Vec<String>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<WireBatch> for RandomBatch {
    type Error = &'static str;

    fn try_from(wire: WireBatch) -> Result<Self, Self::Error> {
        let data = match (wire.success, wire.data) {
            (_, Some(data)) => data,
            (false, None) => Vec::new(),
            (true, None) => return Err("missing field `data`"),
        };

        Ok(Self {
            success: wire.success,
            data,
            extra: wire.extra,
        })
    }
}

impl RandomBatch {
    /// Create a batch with no extra fields
    pub fn new(success: bool, data: Vec<String>) -> Self {
        Self {
            success,
            data,
            extra: Map::new(),
        }
    }

    /// Decode a batch from a raw JSON body
    pub fn from_json(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Serialize to a single JSON line (without the trailing newline)
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Hex tokens joined by line breaks
    pub fn hex_lines(&self) -> String {
        self.data.join("\n")
    }

    /// Number of tokens in the batch
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Why a single attempt did not yield a batch
///
/// The `Display` form of each variant is the line written to the error log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    /// The endpoint answered with a status other than 200
    #[error("Request failed or rate limit exceeded, status code: {0}")]
    HttpStatus(u16),

    /// Connection, DNS, timeout or body decoding failure
    #[error("Request failed or rate limit exceeded, error: {0}")]
    TransportError(String),

    /// Well-formed response that reports a logical failure
    #[error("Request was not successful. {0}.")]
    ApplicationError(String),
}

impl FailureReason {
    /// Short machine-friendly label, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::HttpStatus(_) => "http_status",
            FailureReason::TransportError(_) => "transport",
            FailureReason::ApplicationError(_) => "application",
        }
    }
}

/// Outcome of one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FetchAttemptResult {
    Success { payload: RandomBatch },
    Failure { reason: FailureReason },
}

impl FetchAttemptResult {
    pub fn failure(reason: FailureReason) -> Self {
        FetchAttemptResult::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchAttemptResult::Success { .. })
    }
}
