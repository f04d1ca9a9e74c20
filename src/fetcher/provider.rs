//! Media provider seam: an abstraction over the network fetch, enabling
//! worker tests without a live server.

use crate::error::FetchError;
use reqwest::header;

/// A fetched media payload plus the response metadata the extension
/// reconciliation step needs.
#[derive(Clone, Debug)]
pub struct FetchedMedia {
    /// Response body
    pub bytes: Vec<u8>,
    /// Declared `Content-Type`, if any
    pub content_type: Option<String>,
    /// Filename hint from `Content-Disposition`, if any
    pub filename_hint: Option<String>,
}

/// Abstraction over fetching one URL's content.
#[async_trait::async_trait]
pub trait MediaProvider: Send + Sync {
    /// Fetch the URL in a single attempt. Every failure mode maps to a
    /// [`FetchError`]; retries are the caller's business (and this
    /// pipeline deliberately has none).
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, FetchError>;
}

/// Production [`MediaProvider`] backed by a shared [`reqwest::Client`].
///
/// The client carries the configured connect and total-request timeouts,
/// so a single unreachable host cannot stall a shard beyond one timeout.
pub struct HttpMediaProvider {
    client: reqwest::Client,
}

impl HttpMediaProvider {
    /// Wrap a configured client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl MediaProvider for HttpMediaProvider {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, FetchError> {
        let parsed = url::Url::parse(url)?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let filename_hint = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(crate::resolver::filename_from_content_disposition);

        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedMedia {
            bytes,
            content_type,
            filename_hint,
        })
    }
}
