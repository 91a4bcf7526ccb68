//! HTTP fetcher backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::FetchError;

use super::Fetcher;

/// Default per-fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default limit on the size of a source image: 10MB.
pub const DEFAULT_MAX_SOURCE_SIZE: usize = 10 * 1024 * 1024;

/// Fetches source images over HTTP(S).
///
/// The body is streamed chunk by chunk so oversized sources are rejected
/// without buffering them entirely.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_size: usize,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout and size limit.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_limits(DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_SOURCE_SIZE)
    }

    /// Create a fetcher with a custom timeout and source size limit.
    pub fn with_limits(timeout: Duration, max_size: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("image-previewer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, max_size })
    }

    /// Maximum accepted body size in bytes.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    async fn get(&self, url: Url, headers: &HeaderMap) -> Result<Bytes, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_size as u64 {
                return Err(FetchError::TooLarge {
                    limit: self.max_size,
                });
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_size {
                return Err(FetchError::TooLarge {
                    limit: self.max_size,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, bytes = body.len(), "Fetched source image");
        Ok(body.freeze())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        let url = parse_source_url(url)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.get(url, headers) => result,
        }
    }
}

/// Parse and check a source URL; only http and https are fetched.
pub(crate) fn parse_source_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            })
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(parsed)
}

// =============================================================================
// Tests
// =============================================================================
