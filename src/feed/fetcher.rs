use crate::config::Config;
use crate::feed::parser::{parse_feed, Item};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching one source.
///
/// Any of these aborts the whole poll cycle. The fetcher never retries;
/// the poll timer or the first-run loop does.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: {status} {reason}")]
    HttpStatus { status: u16, reason: String },
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Body could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Anything that can turn a source path into its current items.
///
/// The poll controller is generic over this so cycles can run against
/// scripted sources in tests.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<Vec<Item>, FetchError>;
}

/// Fetches feeds over HTTP: `GET {base_url}{source}{suffix}`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    suffix: String,
    user_agent: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        suffix: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            suffix: suffix.into(),
            user_agent: user_agent.into(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override the per-fetch time limit (request and body together).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a fetcher from a validated config.
    pub fn from_config(client: reqwest::Client, config: &Config) -> Self {
        Self::new(
            client,
            config.base_url.clone(),
            config.feed_suffix.clone(),
            config.user_agent.clone(),
        )
    }

    pub fn url_for(&self, source: &str) -> String {
        format!("{}{}{}", self.base_url, source, self.suffix)
    }
}

#[async_trait]
impl FeedSource for HttpFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<Item>, FetchError> {
        let url = self.url_for(source);

        // Covers the body read too: a server that trickles bytes is a timeout.
        let bytes = tokio::time::timeout(self.timeout, self.download(&url))
            .await
            .map_err(|_| FetchError::Timeout)??;
        let items = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

        tracing::debug!(url = %url, items = items.len(), "Fetched feed");
        Ok(items)
    }
}

impl HttpFetcher {
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = %status, "Feed request rejected");
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        read_limited_bytes(response, MAX_FEED_SIZE).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
