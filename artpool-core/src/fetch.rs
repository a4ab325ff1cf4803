//! Candidate downloads with bounded retry.

use std::time::Duration;

use artpool_model::RetryConfig;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{PoolError, Result};

/// GET over whatever transport the run was given.
///
/// `cancel` is the run-wide token. Implementations may refuse to start new
/// work once it fires, but must not abort a transfer already under way.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>>;
}

/// Production fetcher over one shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Client used for both provider queries and downloads in one run.
    pub fn default_client() -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("artpool/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PoolError::Internal(format!("Failed to create HTTP client: {e}")))
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.http_client
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, _cancel: &CancellationToken) -> Result<Vec<u8>> {
        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(PoolError::HttpStatus {
                status: response.status(),
                url: url.to_string(),
            });
        }

        let expected_len = response.content_length();
        let bytes = response.bytes().await?;

        if let Some(content_len) = expected_len
            && bytes.len() as u64 != content_len
        {
            return Err(PoolError::TruncatedBody {
                url: url.to_string(),
                got: bytes.len() as u64,
                expected: content_len,
            });
        }
        if bytes.is_empty() {
            return Err(PoolError::InvalidMedia(format!("empty body from {url}")));
        }

        Ok(bytes.to_vec())
    }
}

/// Fetch `url`, retrying transient failures with exponential backoff.
///
/// Cancellation is not observed here. The run stops between items, so a
/// download that started runs its retries out.
pub async fn fetch_with_retry(
    fetcher: &dyn ImageFetcher,
    url: &str,
    retry: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    let mut attempt: u16 = 0;
    loop {
        match fetcher.fetch(url, cancel).await {
            Ok(bytes) => {
                if attempt > 0 {
                    debug!(url, attempt, "[fetch] succeeded after retry");
                }
                return Ok(bytes);
            }
            Err(err) if attempt < retry.max_attempts && err.is_transient() => {
                attempt += 1;
                let delay = retry.delay_for(attempt);
                warn!(
                    "[fetch] retrying (attempt {}/{}) in {:?}: url={}, err={}",
                    attempt, retry.max_attempts, delay, url, err
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
