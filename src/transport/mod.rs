//! Upload transport - delivers sealed logs to the collection backend
//!
//! The orchestrator only depends on [`UploadTransport`]. Any error is treated
//! as retryable: the record stays queued and the backoff grows. Timeouts and
//! any retries inside a single request belong to the transport.

mod http;

pub use http::HttpTransport;

use crate::types::EncryptedLogRecord;

/// Network delivery of one encrypted log
#[async_trait::async_trait]
pub trait UploadTransport: Send + Sync {
    /// Upload `record`, resolving once with the outcome.
    ///
    /// May complete on any task; the orchestrator moves the result back onto
    /// its own context before acting on it.
    async fn upload(&self, record: &EncryptedLogRecord) -> Result<(), TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned status {0}")]
    ServerError(reqwest::StatusCode),
    #[error("failed to read encrypted log: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport not configured: {0}")]
    NotConfigured(String),
    /// Failure reported by a non-HTTP transport
    #[error("upload failed: {0}")]
    Other(String),
}
