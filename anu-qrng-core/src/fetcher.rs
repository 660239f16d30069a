//! Retrying fetcher for the ANU QRNG API
//!
//! One call to [`RetryingFetcher::fetch_with_retry`] is a cycle: up to `max_attempts` GET
//! requests, a fixed pause between them, and a verdict. Every failed attempt lands in the
//! error sink, every valid batch in the results sink. Nothing observed here escapes as an
//! error; the caller only learns whether a batch was obtained.

use crate::config::PollerConfig;
use crate::metrics::PollerMetrics;
use crate::protocol::{FailureReason, FetchAttemptResult, RandomBatch, SUCCESS_FIELD_FALSE};
use crate::retry::{pause, Pause, RetryPolicy};
use crate::sink::{ErrorLogFile, ErrorSink, JsonLinesFile, ResultsSink};
use crate::transport::{HttpTransport, RawResponse, Transport};
use crate::Result;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Fetcher wired to the real HTTP client and the on-disk sinks
pub type DefaultFetcher = RetryingFetcher<HttpTransport, JsonLinesFile, ErrorLogFile>;

/// Obtains one valid [`RandomBatch`] per cycle, masking transient failures
pub struct RetryingFetcher<T, R, E> {
    transport: T,
    results: R,
    errors: E,
    endpoint: Url,
    policy: RetryPolicy,
    metrics: PollerMetrics,
}

impl DefaultFetcher {
    /// Build the production fetcher from configuration
    pub fn from_config(config: &PollerConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Self::new(
            config,
            transport,
            JsonLinesFile::new(&config.results_path),
            ErrorLogFile::new(&config.error_log_path),
        )
    }
}

impl<T, R, E> RetryingFetcher<T, R, E>
where
    T: Transport,
    R: ResultsSink,
    E: ErrorSink,
{
    /// Create a fetcher with injected collaborators
    pub fn new(config: &PollerConfig, transport: T, results: R, errors: E) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            transport,
            results,
            errors,
            endpoint: config.endpoint()?,
            policy: RetryPolicy::from(config),
            metrics: PollerMetrics::new(),
        })
    }

    pub fn metrics(&self) -> &PollerMetrics {
        &self.metrics
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Perform a single attempt and classify its outcome
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn fetch_once(&self) -> FetchAttemptResult {
        match self.transport.get(&self.endpoint).await {
            Ok(response) => classify(response),
            Err(e) => FetchAttemptResult::failure(FailureReason::TransportError(e.0)),
        }
    }

    /// Run one cycle
    ///
    /// Returns the first valid batch, or `None` once every attempt failed. A cycle
    /// interrupted by `cancel` also returns `None`; the interrupted attempt is not recorded
    /// as a failure.
    pub async fn fetch_with_retry(&self, cancel: &CancellationToken) -> Option<RandomBatch> {
        let max_attempts = self.policy.max_attempts;

        for attempt in self.policy.attempts() {
            info!(
                "Sending request to QRNG API (attempt {}/{})",
                attempt, max_attempts
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Attempt {} abandoned, shutdown requested", attempt);
                    return None;
                }
                result = self.fetch_once() => result,
            };
            self.metrics.record_attempt();

            match result {
                FetchAttemptResult::Success { payload } => {
                    self.persist(&payload).await;
                    return Some(payload);
                }
                FetchAttemptResult::Failure { reason } => {
                    self.record_failure(attempt, &reason).await;
                }
            }

            if let Some(delay) = self.policy.delay_after(attempt) {
                info!("Retrying in {} seconds...", delay.as_secs_f64());
                if pause(delay, cancel).await == Pause::Cancelled {
                    return None;
                }
            }
        }

        warn!(
            "Failed to get a valid response after {} attempts",
            max_attempts
        );
        None
    }

    async fn persist(&self, batch: &RandomBatch) {
        info!("Valid JSON response received ({} tokens)", batch.len());
        if let Ok(pretty) = serde_json::to_string_pretty(batch) {
            debug!("Received JSON data: {}", pretty);
        }

        match self.results.append_batch(batch).await {
            Ok(()) => self.metrics.record_batch(batch.len()),
            Err(e) => error!("Failed to persist batch: {}", e),
        }

        info!(hex = %batch.hex_lines(), "Extracted {} hex numbers", batch.len());
    }

    async fn record_failure(&self, attempt: u32, reason: &FailureReason) {
        self.metrics.record_attempt_failure();
        warn!(kind = reason.kind(), attempt, "{}", reason);

        if let Err(e) = self.errors.append_failure(reason).await {
            error!("Failed to write error log: {}", e);
        }
    }
}

/// Classify a raw HTTP exchange
///
/// Any status other than 200 is an [`FailureReason::HttpStatus`] and the body is left
/// untouched. A 200 body that does not decode is a [`FailureReason::TransportError`].
pub fn classify(response: RawResponse) -> FetchAttemptResult {
    if response.status != StatusCode::OK.as_u16() {
        return FetchAttemptResult::failure(FailureReason::HttpStatus(response.status));
    }

    let batch = match RandomBatch::from_json(&response.body) {
        Ok(batch) => batch,
        Err(e) => {
            return FetchAttemptResult::failure(FailureReason::TransportError(format!(
                "invalid response body: {}",
                e
            )))
        }
    };

    if !batch.success {
        return FetchAttemptResult::failure(FailureReason::ApplicationError(
            SUCCESS_FIELD_FALSE.to_string(),
        ));
    }

    FetchAttemptResult::Success { payload: batch }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::transport::{ScriptedTransport, TransportFailure};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    const OK_BODY: &str = r#"{"success":true,"data":["a1b2","c3d4"]}"#;

    struct Harness {
        transport: Arc<ScriptedTransport>,
        results: Arc<MemorySink>,
        errors: Arc<MemorySink>,
        fetcher: RetryingFetcher<Arc<ScriptedTransport>, Arc<MemorySink>, Arc<MemorySink>>,
    }

    fn harness(transport: ScriptedTransport) -> Harness {
        let transport = Arc::new(transport);
        let results = Arc::new(MemorySink::default());
        let errors = Arc::new(MemorySink::default());
        let fetcher = RetryingFetcher::new(
            &PollerConfig::default(),
            Arc::clone(&transport),
            Arc::clone(&results),
            Arc::clone(&errors),
        )
        .unwrap();

        Harness {
            transport,
            results,
            errors,
            fetcher,
        }
    }

    fn timeout() -> std::result::Result<RawResponse, TransportFailure> {
        Err(TransportFailure("operation timed out".to_string()))
    }

    fn ok() -> std::result::Result<RawResponse, TransportFailure> {
        Ok(RawResponse::ok(OK_BODY))
    }

    fn status(code: u16) -> std::result::Result<RawResponse, TransportFailure> {
        Ok(RawResponse::status(code))
    }

    fn rejected() -> std::result::Result<RawResponse, TransportFailure> {
        Ok(RawResponse::ok(r#"{"success":false}"#))
    }

    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "elapsed {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    #[test]
    fn test_classify_success() {
        let result = classify(RawResponse::ok(OK_BODY));
        assert_eq!(
            result,
            FetchAttemptResult::Success {
                payload: RandomBatch::new(true, vec!["a1b2".into(), "c3d4".into()])
            }
        );
    }

    #[test]
    fn test_classify_success_field_false() {
        let result = classify(RawResponse::ok(r#"{"success":false,"data":[]}"#));
        assert_eq!(
            result,
            FetchAttemptResult::failure(FailureReason::ApplicationError(
                "Success field is false".to_string()
            ))
        );
    }

    #[test]
    fn test_classify_non_ok_ignores_body() {
        let response = RawResponse {
            status: 500,
            body: bytes::Bytes::from_static(OK_BODY.as_bytes()),
        };
        assert_eq!(
            classify(response),
            FetchAttemptResult::failure(FailureReason::HttpStatus(500))
        );

        let response = RawResponse {
            status: 503,
            body: bytes::Bytes::from_static(b"not json at all"),
        };
        assert_eq!(
            classify(response),
            FetchAttemptResult::failure(FailureReason::HttpStatus(503))
        );
    }

    #[test]
    fn test_classify_success_without_data() {
        let result = classify(RawResponse::ok(r#"{"success":true,"length":1024}"#));
        assert!(!result.is_success());
        match result {
            FetchAttemptResult::Failure {
                reason: FailureReason::TransportError(message),
            } => assert!(message.contains("missing field `data`"), "{}", message),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_classify_malformed_body() {
        match classify(RawResponse::ok("<html>Too Many Requests</html>")) {
            FetchAttemptResult::Failure {
                reason: FailureReason::TransportError(message),
            } => assert!(message.starts_with("invalid response body")),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let h = harness(ScriptedTransport::new([ok()]));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let batch = h.fetcher.fetch_with_retry(&cancel).await.unwrap();

        assert_eq!(batch.data, vec!["a1b2", "c3d4"]);
        assert_eq!(h.transport.calls(), 1);
        assert_eq!(h.results.lines(), vec![OK_BODY.to_string()]);
        assert!(h.errors.lines().is_empty());
        assert_elapsed(start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_exhaust_cycle() {
        let h = harness(ScriptedTransport::new([
            timeout(),
            status(503),
            timeout(),
            ok(),
        ]));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        assert!(h.fetcher.fetch_with_retry(&cancel).await.is_none());

        assert_eq!(h.transport.calls(), 3);
        assert_eq!(
            h.errors.lines(),
            vec![
                "Request failed or rate limit exceeded, error: operation timed out",
                "Request failed or rate limit exceeded, status code: 503",
                "Request failed or rate limit exceeded, error: operation timed out",
            ]
        );
        assert!(h.results.lines().is_empty());
        // No pause after the final attempt.
        assert_elapsed(start, Duration::from_secs(4));
        assert_eq!(h.fetcher.metrics().attempts_failed(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_attempt_k() {
        for k in 1..=3usize {
            let script = (1..k)
                .map(|_| status(429))
                .chain(std::iter::once(ok()))
                .chain(std::iter::once(ok()));
            let h = harness(ScriptedTransport::new(script));
            let cancel = CancellationToken::new();

            assert!(h.fetcher.fetch_with_retry(&cancel).await.is_some());

            assert_eq!(h.transport.calls(), k, "attempts for k={}", k);
            assert_eq!(h.errors.lines().len(), k - 1, "error lines for k={}", k);
            assert_eq!(h.results.lines().len(), 1, "result lines for k={}", k);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_then_success() {
        let h = harness(ScriptedTransport::new([timeout(), timeout(), ok()]));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let batch = h.fetcher.fetch_with_retry(&cancel).await.unwrap();

        assert_eq!(batch.data, vec!["a1b2", "c3d4"]);
        assert_eq!(h.errors.lines().len(), 2);
        assert_eq!(h.results.lines().len(), 1);
        assert_elapsed(start, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_application_error_is_retried() {
        let h = harness(ScriptedTransport::new([rejected(), rejected(), rejected()]));
        let cancel = CancellationToken::new();

        assert!(h.fetcher.fetch_with_retry(&cancel).await.is_none());

        assert_eq!(h.transport.calls(), 3);
        assert!(h
            .errors
            .lines()
            .iter()
            .all(|line| line == "Request was not successful. Success field is false."));
        assert_eq!(h.errors.lines().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_delay() {
        let h = harness(ScriptedTransport::new([timeout(), ok()]));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        assert!(h.fetcher.fetch_with_retry(&cancel).await.is_none());

        assert_eq!(h.transport.calls(), 1);
        assert_eq!(h.errors.lines().len(), 1);
        assert!(h.results.lines().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_request() {
        let h = harness(ScriptedTransport::new([ok()]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(h.fetcher.fetch_with_retry(&cancel).await.is_none());
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_batch() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new([ok()]));
        let errors = Arc::new(MemorySink::default());
        // A directory cannot be opened for appending.
        let fetcher = RetryingFetcher::new(
            &PollerConfig::default(),
            Arc::clone(&transport),
            JsonLinesFile::new(dir.path()),
            Arc::clone(&errors),
        )
        .unwrap();

        let batch = fetcher.fetch_with_retry(&CancellationToken::new()).await;

        assert!(batch.is_some());
        assert_eq!(transport.calls(), 1);
        assert!(errors.lines().is_empty());
        assert_eq!(fetcher.metrics().batches_persisted(), 0);
    }

    #[tokio::test]
    async fn test_against_http_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/API/jsonI.php")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(OK_BODY)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = PollerConfig {
            endpoint_url: format!("{}/API/jsonI.php?length=2&type=hex16", server.url()),
            results_path: dir.path().join("random_numbers.json"),
            error_log_path: dir.path().join("error.log"),
            ..Default::default()
        };
        let fetcher = DefaultFetcher::from_config(&config).unwrap();

        let batch = fetcher
            .fetch_with_retry(&CancellationToken::new())
            .await
            .unwrap();

        mock.assert_async().await;
        let stored = crate::sink::read_batches(&config.results_path).await.unwrap();
        assert_eq!(stored, vec![batch]);
        assert!(!config.error_log_path.exists());
    }
}
