//! Metadata probe and ranged fetch for a single URL.

use crate::error::{HttpFsError, Result};
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap, LAST_MODIFIED, RANGE};
use std::time::{Duration, SystemTime};
use tracing::{Span, debug, info_span, trace};
use url::Url;

/// Default transport timeout for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `Accept-Ranges` values that explicitly mean "no range support".
const UNSUPPORTED_RANGE_VALUES: [&str; 6] = ["none", "false", "False", "0", "no", "No"];

/// Transport options applied to every [`RangeClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request timeout enforced by the HTTP client. `None` disables it.
    pub timeout: Option<Duration>,
    /// Value sent in the `User-Agent` header.
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            user_agent: concat!("tempofs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientOptions {
    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header value.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Range support advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptRanges {
    /// `Accept-Ranges: bytes`.
    Bytes,
    /// Header absent or one of the well-known "no" values.
    Unsupported,
    /// Any other value. Treated as unsupported, but worth a warning.
    Unknown(String),
}

impl AcceptRanges {
    /// Classifies a raw `Accept-Ranges` header value.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            None => AcceptRanges::Unsupported,
            Some("bytes") => AcceptRanges::Bytes,
            Some(v) if UNSUPPORTED_RANGE_VALUES.contains(&v) => AcceptRanges::Unsupported,
            Some(v) => AcceptRanges::Unknown(v.to_string()),
        }
    }

    /// True only for `Accept-Ranges: bytes`.
    pub fn is_bytes(&self) -> bool {
        matches!(self, AcceptRanges::Bytes)
    }
}

/// What a metadata probe learned about a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMeta {
    /// Declared `Content-Length`, 0 when absent or unparsable.
    pub size: u64,
    /// Parsed `Last-Modified`, if present and well formed.
    pub last_modified: Option<SystemTime>,
    /// Range support advertised by the server.
    pub accept_ranges: AcceptRanges,
}

impl ResourceMeta {
    /// Extracts size, modification time and range support from response headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let last_modified = headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| chrono::DateTime::parse_from_rfc2822(v.trim()).ok())
            .map(SystemTime::from);

        let accept_ranges = headers
            .get(ACCEPT_RANGES)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        Self {
            size,
            last_modified,
            accept_ranges: AcceptRanges::from_header(accept_ranges.as_deref()),
        }
    }

    pub fn is_seekable(&self) -> bool {
        self.accept_ranges.is_bytes()
    }
}

/// Formats an inclusive byte range header value.
pub fn range_header(start: u64, end: u64) -> String {
    format!("bytes={start}-{end}")
}

/// HTTP session bound to one remote resource.
///
/// Each client owns its connection pool. Clones share it, so streams are
/// given a freshly built client rather than a clone.
#[derive(Debug, Clone)]
pub struct RangeClient {
    client: reqwest::Client,
    url: Url,
    span: Span,
}

impl RangeClient {
    /// Creates a client for `url` with its own logging span.
    pub fn new(url: Url, options: &ClientOptions) -> Result<Self> {
        let span = info_span!("resource", url = %url);
        Self::with_span(url, options, span)
    }

    /// Creates a client that logs under the given span.
    pub fn with_span(url: Url, options: &ClientOptions, span: Span) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(options.user_agent.clone());
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(HttpFsError::Client)?;
        Ok(Self { client, url, span })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Logging span every message about this resource is emitted under.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Issues a `HEAD` request and extracts the resource metadata.
    ///
    /// A non-success status is an error.
    pub async fn probe(&self) -> Result<ResourceMeta> {
        trace!(parent: &self.span, "probe");
        let response = self
            .client
            .head(self.url.clone())
            .send()
            .await
            .map_err(|source| self.transport_error(source))?;
        self.check_status(response.status())?;

        let meta = ResourceMeta::from_headers(response.headers());
        debug!(
            parent: &self.span,
            size = meta.size,
            accept_ranges = ?meta.accept_ranges,
            has_last_modified = meta.last_modified.is_some(),
            "probe complete"
        );
        Ok(meta)
    }

    /// Fetches the inclusive byte range `[start, end]`.
    ///
    /// The returned body never exceeds the requested span. Servers that
    /// ignore the `Range` header and answer `200` with the full body are
    /// handled by slicing the body locally.
    pub async fn fetch(&self, start: u64, end: u64) -> Result<Bytes> {
        let range = range_header(start, end);
        debug!(parent: &self.span, %range, "ranged fetch");

        let response = self
            .client
            .get(self.url.clone())
            .header(RANGE, range)
            .send()
            .await
            .map_err(|source| self.transport_error(source))?;
        let status = response.status();
        self.check_status(status)?;

        let body = response
            .bytes()
            .await
            .map_err(|source| self.transport_error(source))?;

        let data = if status == StatusCode::PARTIAL_CONTENT {
            clip_len(body, start, end)
        } else {
            clip_full_body(body, start, end)
        };
        trace!(parent: &self.span, received = data.len(), "ranged fetch complete");
        Ok(data)
    }

    fn check_status(&self, status: StatusCode) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(HttpFsError::Status {
                url: self.url.to_string(),
                status,
            })
        }
    }

    fn transport_error(&self, source: reqwest::Error) -> HttpFsError {
        HttpFsError::Transport {
            url: self.url.to_string(),
            source,
        }
    }
}

/// Number of bytes in the inclusive span `[start, end]`, saturated to `usize`.
fn span_len(start: u64, end: u64) -> usize {
    usize::try_from(end.saturating_sub(start).saturating_add(1)).unwrap_or(usize::MAX)
}

/// Truncates a `206` body to the requested span.
fn clip_len(mut body: Bytes, start: u64, end: u64) -> Bytes {
    body.truncate(span_len(start, end));
    body
}

/// Cuts the requested span out of a full-body `200` response.
fn clip_full_body(body: Bytes, start: u64, end: u64) -> Bytes {
    let from = usize::try_from(start).unwrap_or(usize::MAX).min(body.len());
    let to = from.saturating_add(span_len(start, end)).min(body.len());
    body.slice(from..to)
}
