//! Append-only sinks for results and failures
//!
//! Both sinks are plain files opened in append mode for every write, so each record is on
//! disk before the fetcher moves on. The results file holds one JSON object per line; it is
//! not a single JSON document.

use crate::protocol::{FailureReason, RandomBatch};
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Receives every successfully fetched batch
#[async_trait]
pub trait ResultsSink: Send + Sync {
    async fn append_batch(&self, batch: &RandomBatch) -> Result<()>;
}

/// Receives one entry per failed attempt
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn append_failure(&self, reason: &FailureReason) -> Result<()>;
}

#[async_trait]
impl<S: ResultsSink + ?Sized> ResultsSink for std::sync::Arc<S> {
    async fn append_batch(&self, batch: &RandomBatch) -> Result<()> {
        (**self).append_batch(batch).await
    }
}

#[async_trait]
impl<S: ErrorSink + ?Sized> ErrorSink for std::sync::Arc<S> {
    async fn append_failure(&self, reason: &FailureReason) -> Result<()> {
        (**self).append_failure(reason).await
    }
}

/// Newline-delimited JSON results file
#[derive(Debug, Clone)]
pub struct JsonLinesFile {
    path: PathBuf,
}

impl JsonLinesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultsSink for JsonLinesFile {
    async fn append_batch(&self, batch: &RandomBatch) -> Result<()> {
        let line = batch.to_json_line()?;
        append_line(&self.path, &line).await
    }
}

/// Human-readable error log
#[derive(Debug, Clone)]
pub struct ErrorLogFile {
    path: PathBuf,
}

impl ErrorLogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ErrorSink for ErrorLogFile {
    async fn append_failure(&self, reason: &FailureReason) -> Result<()> {
        append_line(&self.path, &reason.to_string()).await
    }
}

async fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    let mut record = String::with_capacity(line.len() + 1);
    record.push_str(line);
    record.push('\n');

    file.write_all(record.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Decode every batch stored in a results file, in append order
///
/// Blank lines are skipped. A missing file yields an empty list.
pub async fn read_batches(path: impl AsRef<Path>) -> Result<Vec<RandomBatch>> {
    let contents = match tokio::fs::read_to_string(path.as_ref()).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| RandomBatch::from_json(line.as_bytes()).map_err(crate::Error::from))
        .collect()
}

/// In-memory sink recording rendered lines, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemorySink {
    lines: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemorySink {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ResultsSink for MemorySink {
    async fn append_batch(&self, batch: &RandomBatch) -> Result<()> {
        self.lines.lock().push(batch.to_json_line()?);
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl ErrorSink for MemorySink {
    async fn append_failure(&self, reason: &FailureReason) -> Result<()> {
        self.lines.lock().push(reason.to_string());
        Ok(())
    }
}
