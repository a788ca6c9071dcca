//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building an HTTP client with browser-like headers
//! - Bounded retries for transient failures (transport errors, 5xx, 429)
//! - Pacing retries with the host's crawl delay

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// User-Agent sent when the configuration does not override it
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.5993.118 Safari/537.36";

/// A response accepted as final by the retry loop
#[derive(Debug, Clone)]
pub struct Fetched {
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl Fetched {
    /// Returns true for 2xx responses, the only ones worth extracting
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a single attempt did not produce a final response
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("retryable status {0}")]
    Status(u16),
}

/// Errors returned by a fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("all {attempts} retries failed for {url}: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: AttemptError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Retrying GET primitive used by workers and the robots policy builder
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches `url` with at most `max_retries` attempts, sleeping `delay`
    /// between attempts
    async fn get(&self, url: &str, max_retries: u32, delay: Duration) -> FetchResult<Fetched>;
}

/// `Fetch` implementation backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher that identifies itself with `user_agent`
    ///
    /// # Arguments
    ///
    /// * `user_agent` - The User-Agent header value
    /// * `timeout` - Total timeout for a single attempt
    pub fn new(user_agent: &str, timeout: Duration) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client })
    }

    /// Performs one attempt; `Err` means the attempt is retryable
    async fn attempt(&self, url: &str) -> Result<Fetched, AttemptError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if is_retryable(status) {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response.bytes().await?.to_vec();

        Ok(Fetched {
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self, url: &str, max_retries: u32, delay: Duration) -> FetchResult<Fetched> {
        let attempts = max_retries.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(url).await {
                Ok(fetched) => return Ok(fetched),
                Err(last) if attempt >= attempts => {
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts,
                        last,
                    });
                }
                Err(e) => {
                    tracing::debug!(url, attempt, error = %e, "Fetch attempt failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Server overload statuses worth retrying; every other status is final
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
