//! HTTP transport - POSTs the sealed log body to the collection endpoint

use std::time::Duration;

use super::{TransportError, UploadTransport};
use crate::config::defaults::LOG_UUID_HEADER;
use crate::config::UploadConfig;
use crate::types::EncryptedLogRecord;

/// HTTP client for log uploads
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    upload_url: String,
    auth_token: Option<String>,
}

impl HttpTransport {
    /// Create a transport posting to `upload_url`
    pub fn new(
        upload_url: &str,
        auth_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        if upload_url.is_empty() {
            return Err(TransportError::NotConfigured(
                "upload.url is not set".to_string(),
            ));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            upload_url: upload_url.to_string(),
            auth_token: auth_token.map(str::to_string),
        })
    }

    pub fn from_config(config: &UploadConfig) -> Result<Self, TransportError> {
        Self::new(
            &config.url,
            config.auth_token.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Get upload URL for logging
    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }
}

#[async_trait::async_trait]
impl UploadTransport for HttpTransport {
    async fn upload(&self, record: &EncryptedLogRecord) -> Result<(), TransportError> {
        let body = tokio::fs::read(record.path()).await?;

        let mut req = self
            .http
            .post(&self.upload_url)
            .header("Content-Type", "application/octet-stream")
            .header(LOG_UUID_HEADER, record.id().to_string())
            .body(body);

        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let resp = req.send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::ServerError(resp.status()))
        }
    }
}
