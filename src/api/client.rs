use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::feed::{parse_page, FeedPage, SourceKind};
use crate::util::validate_base_url;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Parts requested from the `videos` endpoint. Statistics and content
/// details are what give chart and lookup items their duration and metrics.
const VIDEO_PARTS: &str = "snippet,statistics,contentDetails";

/// Errors that can occur while querying the metadata service.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was cut short (fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body parsed but is not the expected JSON envelope
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Coarse classification used by the presentation layer for messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure: the service could not be reached or refused us.
    UpstreamUnavailable,
    /// The service answered with something we cannot read.
    MalformedResponse,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Malformed(_) => ErrorKind::MalformedResponse,
            FetchError::Network(_)
            | FetchError::Timeout
            | FetchError::HttpStatus(_)
            | FetchError::ResponseTooLarge
            | FetchError::IncompleteResponse { .. } => ErrorKind::UpstreamUnavailable,
        }
    }
}

/// The four query shapes the engine needs from the metadata service.
///
/// Implementations return normalized pages: unusable items are already
/// dropped, and a response without an items array is an empty page.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Most-popular chart for a region.
    async fn trending(
        &self,
        region: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<FeedPage, FetchError>;

    /// Full-text search; pages carry both next and previous cursors.
    async fn search(
        &self,
        term: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<FeedPage, FetchError>;

    /// Look up specific items by id.
    async fn lookup(&self, ids: &[String]) -> Result<FeedPage, FetchError>;

    /// Items related to a focal item.
    async fn related(&self, focal_id: &str, page_size: u32) -> Result<FeedPage, FetchError>;

    /// Source name for logging
    fn name(&self) -> &'static str;
}

/// HTTP implementation of [`VideoSource`].
///
/// The API key, when present, is only ever sent as the `key` query parameter
/// and never logged.
pub struct YoutubeClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl std::fmt::Debug for YoutubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoutubeClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl YoutubeClient {
    /// Create a client against `base_url`.
    ///
    /// # Errors
    ///
    /// Fails if the base URL is not https (plain http is allowed for
    /// localhost only) or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let base_url = validate_base_url(base_url)?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(timeout)
            .build()?;

        if api_key.is_none() {
            tracing::warn!("No API key configured; the metadata service will likely reject requests");
        }

        Ok(Self {
            http,
            base_url,
            api_key,
            timeout,
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), name)
    }

    async fn get_page(
        &self,
        endpoint: &str,
        mut params: Vec<(&'static str, String)>,
        kind: SourceKind,
    ) -> Result<FeedPage, FetchError> {
        if let Some(key) = &self.api_key {
            params.push(("key", key.expose_secret().to_string()));
        }

        let request = self.http.get(self.endpoint(endpoint)).query(&params);
        let bytes = tokio::time::timeout(self.timeout, async {
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }
            read_limited_bytes(response, MAX_RESPONSE_SIZE).await
        })
        .await
        .map_err(|_| FetchError::Timeout)?
        .inspect_err(|e| {
            tracing::warn!(endpoint = endpoint, kind = kind.as_str(), error = %e, "Metadata request failed");
        })?;

        let parsed = parse_page(&bytes, kind).map_err(|e| FetchError::Malformed(e.to_string()))?;

        if parsed.skipped > 0 {
            tracing::debug!(
                endpoint = endpoint,
                kind = kind.as_str(),
                skipped = parsed.skipped,
                "Dropped unusable items"
            );
        }
        tracing::debug!(
            endpoint = endpoint,
            kind = kind.as_str(),
            items = parsed.page.items.len(),
            has_next = parsed.page.next_cursor.is_some(),
            "Fetched page"
        );

        Ok(parsed.page)
    }
}

#[async_trait]
impl VideoSource for YoutubeClient {
    async fn trending(
        &self,
        region: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<FeedPage, FetchError> {
        let mut params = vec![
            ("part", VIDEO_PARTS.to_string()),
            ("chart", "mostPopular".to_string()),
            ("regionCode", region.to_string()),
            ("maxResults", page_size.to_string()),
        ];
        if let Some(token) = cursor {
            params.push(("pageToken", token.to_string()));
        }
        self.get_page("videos", params, SourceKind::Trending).await
    }

    async fn search(
        &self,
        term: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<FeedPage, FetchError> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("type", "video".to_string()),
            ("q", term.to_string()),
            ("maxResults", page_size.to_string()),
        ];
        if let Some(token) = cursor {
            params.push(("pageToken", token.to_string()));
        }
        self.get_page("search", params, SourceKind::Search).await
    }

    async fn lookup(&self, ids: &[String]) -> Result<FeedPage, FetchError> {
        if ids.is_empty() {
            return Ok(FeedPage::default());
        }
        let params = vec![("part", VIDEO_PARTS.to_string()), ("id", ids.join(","))];
        self.get_page("videos", params, SourceKind::Lookup).await
    }

    async fn related(&self, focal_id: &str, page_size: u32) -> Result<FeedPage, FetchError> {
        let params = vec![
            ("part", "snippet".to_string()),
            ("type", "video".to_string()),
            ("relatedToVideoId", focal_id.to_string()),
            ("maxResults", page_size.to_string()),
        ];
        self.get_page("search", params, SourceKind::Related).await
    }

    fn name(&self) -> &'static str {
        "youtube"
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
