//! Polling configuration
//!
//! Every parameter is a fixed constant; [`PollerConfig`] gathers them into one record that is
//! handed to the fetcher and the polling loop at construction.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// ANU QRNG endpoint returning 1024 hex16 tokens per call
pub const DEFAULT_ENDPOINT_URL: &str = "https://qrng.anu.edu.au/API/jsonI.php?length=1024&type=hex16";

/// Attempts per cycle, including the first one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause between two attempts of the same cycle
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Pause between two cycles, whatever the outcome of the first
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(60);

/// Per-request timeout applied by the HTTP client
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Newline-delimited JSON file receiving every successful batch
pub const DEFAULT_RESULTS_PATH: &str = "random_numbers.json";

/// Plain-text file receiving one line per failed attempt
pub const DEFAULT_ERROR_LOG_PATH: &str = "error.log";

/// Poller configuration
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Endpoint queried by every attempt
    pub endpoint_url: String,

    /// Maximum attempts per cycle
    pub max_attempts: u32,

    /// Delay between attempts
    pub retry_delay: Duration,

    /// Delay between cycles
    pub cycle_interval: Duration,

    /// Request timeout
    pub request_timeout: Duration,

    /// Results store path
    pub results_path: PathBuf,

    /// Error log path
    pub error_log_path: PathBuf,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            results_path: PathBuf::from(DEFAULT_RESULTS_PATH),
            error_log_path: PathBuf::from(DEFAULT_ERROR_LOG_PATH),
        }
    }
}

impl PollerConfig {
    /// Parsed endpoint URL
    pub fn endpoint(&self) -> Result<Url> {
        Url::parse(&self.endpoint_url)
            .map_err(|e| Error::Config(format!("Invalid endpoint_url '{}': {}", self.endpoint_url, e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint()?;
        match endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::Config(format!(
                    "endpoint_url must use http or https, got '{}'",
                    other
                )))
            }
        }

        if self.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config("request_timeout must be > 0".to_string()));
        }

        if self.results_path.as_os_str().is_empty() {
            return Err(Error::Config("results_path cannot be empty".to_string()));
        }

        if self.error_log_path.as_os_str().is_empty() {
            return Err(Error::Config("error_log_path cannot be empty".to_string()));
        }

        if self.results_path == self.error_log_path {
            return Err(Error::Config(
                "results_path and error_log_path must differ".to_string(),
            ));
        }

        Ok(())
    }
}
