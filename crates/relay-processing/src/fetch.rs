//! Outbound image downloads.

use async_trait::async_trait;
use bytes::Bytes;
use relay_core::{RelayError, RelayResult};
use std::time::Duration;
use url::Url;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Bytes fetched from a source URI, with the content type the source reported.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub data: Bytes,
    pub content_type: String,
}

/// Fetches source images for stage A.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, uri: &Url) -> RelayResult<FetchedImage>;
}

/// HTTP(S) fetcher backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, max_bytes })
    }
}

fn content_type_of(headers: &reqwest::header::HeaderMap) -> String {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[tracing::instrument(skip(self), fields(uri = %uri))]
    async fn fetch(&self, uri: &Url) -> RelayResult<FetchedImage> {
        if uri.scheme() != "http" && uri.scheme() != "https" {
            return Err(RelayError::fetch_failed(
                uri.as_str(),
                "only HTTP and HTTPS sources are supported",
            ));
        }

        let start = std::time::Instant::now();
        let response = self.client.get(uri.clone()).send().await.map_err(|e| {
            tracing::warn!(error = %e, "Image download failed");
            RelayError::fetch_failed(uri.as_str(), e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::fetch_failed(
                uri.as_str(),
                format!("source returned status code {}", status),
            ));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(RelayError::fetch_failed(
                    uri.as_str(),
                    format!("image is {} bytes, limit is {}", length, self.max_bytes),
                ));
            }
        }

        let content_type = content_type_of(response.headers());
        let data = response
            .bytes()
            .await
            .map_err(|e| RelayError::fetch_failed(uri.as_str(), e))?;

        if data.len() > self.max_bytes {
            return Err(RelayError::fetch_failed(
                uri.as_str(),
                format!("image is {} bytes, limit is {}", data.len(), self.max_bytes),
            ));
        }

        tracing::debug!(
            size_bytes = data.len(),
            content_type = %content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image downloaded"
        );

        Ok(FetchedImage { data, content_type })
    }
}
