//! Retrieval of raw metadata documents.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Default timeout of a single HTTP fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Metadata fetch errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Invalid metadata URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Refusing non-https metadata URL: {0}")]
    InsecureScheme(String),

    #[error("Metadata request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Metadata endpoint {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("No metadata document for {0}")]
    NotFound(String),
}

/// Raw, unverified metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMetadata {
    /// URL the document was fetched from.
    pub url: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// Source of raw metadata documents.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawMetadata, FetchError>;
}

/// Fetches metadata over HTTP with `reqwest`.
#[derive(Clone)]
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
    https_only: bool,
}

impl HttpMetadataFetcher {
    /// Creates a fetcher with its own HTTP client.
    pub fn new(timeout: Duration, https_only: bool) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, https_only })
    }

    /// Creates a fetcher with a custom HTTP client.
    pub fn with_client(client: reqwest::Client, https_only: bool) -> Self {
        Self { client, https_only }
    }

    fn parse_url(&self, url: &str) -> Result<Url, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.scheme() {
            "https" => Ok(parsed),
            "http" if !self.https_only => Ok(parsed),
            "http" => Err(FetchError::InsecureScheme(url.to_string())),
            other => Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {other}"),
            }),
        }
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<RawMetadata, FetchError> {
        let parsed = self.parse_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response.bytes().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!(url = %url, bytes = body.len(), "Metadata document fetched");

        Ok(RawMetadata {
            url: url.to_string(),
            body: body.to_vec(),
            content_type,
        })
    }
}

/// Serves preloaded documents; used for pinned deployments and tests.
#[derive(Debug, Default)]
pub struct StaticMetadataFetcher {
    documents: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl StaticMetadataFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(url.into(), body.into());
        self
    }

    /// Number of fetches served so far, including misses.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataFetcher for StaticMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<RawMetadata, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let body = self
            .documents
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))?;
        Ok(RawMetadata {
            url: url.to_string(),
            body,
            content_type: Some("application/json".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("{\"entity_id\":\"x\"}", "application/json"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpMetadataFetcher::new(DEFAULT_FETCH_TIMEOUT, false).unwrap();
        let url = format!("{}/metadata", server.uri());
        let raw = fetcher.fetch(&url).await.unwrap();

        assert_eq!(raw.url, url);
        assert_eq!(raw.body, b"{\"entity_id\":\"x\"}");
        assert_eq!(raw.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_http_fetch_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpMetadataFetcher::new(DEFAULT_FETCH_TIMEOUT, false).unwrap();
        let err = fetcher
            .fetch(&format!("{}/metadata", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_https_only_refuses_plain_http() {
        let fetcher = HttpMetadataFetcher::new(DEFAULT_FETCH_TIMEOUT, true).unwrap();
        let err = fetcher
            .fetch("http://node.example/metadata")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InsecureScheme(_)));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let fetcher = HttpMetadataFetcher::new(DEFAULT_FETCH_TIMEOUT, true).unwrap();
        assert!(matches!(
            fetcher.fetch("not a url").await,
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            fetcher.fetch("ftp://node.example/metadata").await,
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_static_fetcher_counts() {
        let fetcher = StaticMetadataFetcher::new().with_document("https://a/md", "{}");
        assert!(fetcher.fetch("https://a/md").await.is_ok());
        assert!(matches!(
            fetcher.fetch("https://b/md").await,
            Err(FetchError::NotFound(_))
        ));
        assert_eq!(fetcher.fetch_count(), 2);
    }
}
