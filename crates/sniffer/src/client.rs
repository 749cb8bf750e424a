use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::{Client, Url};

use crate::error::SniffError;
use crate::header::{HeaderInfo, HEADER_LEN};

pub(crate) const USER_AGENT: &str = "gif-preloader/0.1";

/// `Range` header value covering exactly the first [`HEADER_LEN`] bytes.
const HEADER_RANGE: &str = "bytes=0-9";

/// Whether an image source may be sniffed at all.
///
/// Absolute HTTP(S) URLs and root-relative paths qualify; inline `data:` sources,
/// `blob:` URLs and page-relative paths do not.
pub fn is_fetchable(src: &str) -> bool {
    src.starts_with("http") || src.starts_with('/')
}

/// Fetches and decodes the header of an image resource.
#[async_trait]
pub trait HeaderSniffer: Send + Sync {
    /// Sniff the header of the resource at `url`.
    ///
    /// Any error means the classification is inconclusive.
    async fn sniff(&self, url: &str) -> crate::Result<HeaderInfo>;
}

/// Byte-range sniffer backed by reqwest.
pub struct HttpSniffer {
    client: Client,
    base_url: Option<Url>,
    timeout: Option<Duration>,
}

impl HttpSniffer {
    /// Create a sniffer with a default client and no base URL.
    pub fn new() -> crate::Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(client))
    }

    /// Create a sniffer with an existing reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: None,
            timeout: None,
        }
    }

    /// Resolve root-relative sources against `base_url`.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Abort requests that take longer than `timeout`. Unset by default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn resolve(&self, src: &str) -> crate::Result<Url> {
        if src.starts_with('/') {
            let base = self
                .base_url
                .as_ref()
                .ok_or_else(|| SniffError::InvalidUrl(format!("{} (no base URL)", src)))?;
            return base
                .join(src)
                .map_err(|e| SniffError::InvalidUrl(format!("{}: {}", src, e)));
        }

        Url::parse(src).map_err(|e| SniffError::InvalidUrl(format!("{}: {}", src, e)))
    }
}

#[async_trait]
impl HeaderSniffer for HttpSniffer {
    async fn sniff(&self, url: &str) -> crate::Result<HeaderInfo> {
        let url = self.resolve(url)?;
        tracing::debug!("Sniffing header of {}", url);

        let mut request = self.client.get(url.clone()).header(RANGE, HEADER_RANGE);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let mut response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SniffError::HttpStatus(status.as_u16()));
        }

        // Servers that ignore Range send the whole image; stop once the header is in.
        let mut buf = Vec::with_capacity(HEADER_LEN);
        while buf.len() < HEADER_LEN {
            match response.chunk().await? {
                Some(chunk) => buf.extend_from_slice(&chunk),
                None => break,
            }
        }

        let header = HeaderInfo::parse(&buf)?;
        tracing::debug!(
            "Sniffed {}: signature={} size={}x{}",
            url,
            header.signature_str(),
            header.width,
            header.height
        );
        Ok(header)
    }
}
