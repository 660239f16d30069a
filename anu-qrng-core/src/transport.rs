//! HTTP transport for the ANU QRNG API
//!
//! The fetcher only needs a status code and, for status 200, the raw body. [`Transport`] is
//! the seam that lets tests script those answers; [`HttpTransport`] is the `reqwest`
//! implementation used in production.

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Status line and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Empty unless `status` is 200
    pub body: Bytes,
}

impl RawResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Bytes::new(),
        }
    }
}

/// The request never produced a usable response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportFailure(pub String);

impl From<reqwest::Error> for TransportFailure {
    fn from(e: reqwest::Error) -> Self {
        TransportFailure(e.to_string())
    }
}

/// Issues a single GET against an endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> std::result::Result<RawResponse, TransportFailure>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn get(&self, url: &Url) -> std::result::Result<RawResponse, TransportFailure> {
        (**self).get(url).await
    }
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .use_rustls_tls()
            .user_agent(concat!("anu-qrng-poller/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Network)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> std::result::Result<RawResponse, TransportFailure> {
        debug!("GET {}", url);

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!("Failed to reach {}: {}", url, e);
            TransportFailure::from(e)
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            // The body of a rejected request is never inspected.
            return Ok(RawResponse::status(status.as_u16()));
        }

        let body = response.bytes().await?;
        debug!("Received {} bytes", body.len());
        Ok(RawResponse::ok(body))
    }
}

/// Transport replaying a fixed script of answers, for tests
///
/// Once the script is exhausted every call returns `fallback`, or a transport failure when
/// no fallback is set.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    script: parking_lot::Mutex<std::collections::VecDeque<std::result::Result<RawResponse, TransportFailure>>>,
    fallback: Option<RawResponse>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptedTransport {
    pub(crate) fn new(
        script: impl IntoIterator<Item = std::result::Result<RawResponse, TransportFailure>>,
    ) -> Self {
        Self {
            script: parking_lot::Mutex::new(script.into_iter().collect()),
            ..Default::default()
        }
    }

    pub(crate) fn with_fallback(mut self, fallback: RawResponse) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, _url: &Url) -> std::result::Result<RawResponse, TransportFailure> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(answer) => answer,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| TransportFailure("connection refused".to_string())),
        }
    }
}
