//! Seekable, read-only byte stream over one HTTP resource.

use super::client::{AcceptRanges, ClientOptions, RangeClient};
use crate::error::{HttpFsError, Result};
use bytes::Bytes;
use std::future::Future;
use std::io::SeekFrom;
use std::time::SystemTime;
use tracing::{Span, debug, warn};
use url::Url;

/// Capabilities of a lazily fetched, read-only byte stream.
///
/// Every read issues at most one request. Nothing is buffered between calls;
/// callers that want read-ahead wrap the stream themselves.
pub trait RangeStream: Send {
    /// Reads up to `limit` bytes from the cursor, or everything up to the end
    /// of the resource when `limit` is `None`.
    ///
    /// Returns an empty buffer at end of stream and for `Some(0)`.
    fn read(&mut self, limit: Option<usize>) -> impl Future<Output = Result<Bytes>> + Send;

    /// Reads into `buf`, returning the number of bytes written (0 at end of stream).
    fn read_into(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Moves the cursor. Positions past the end are allowed; negative ones are not.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Current cursor position.
    fn tell(&self) -> u64;

    /// Drops the stream's HTTP session and its connections. Safe to call more than once.
    fn close(&mut self);

    /// Whether the server advertised byte-range support when the stream was opened.
    fn is_seekable(&self) -> bool;
}

/// [`RangeStream`] backed by HTTP range requests.
///
/// Construction performs one metadata probe; size and seekability are fixed
/// from that point on. Each read is a single ranged `GET`.
#[derive(Debug)]
pub struct HttpRangeFile {
    /// `None` once the stream has been closed.
    client: Option<RangeClient>,
    url: Url,
    span: Span,
    size: u64,
    last_modified: Option<SystemTime>,
    seekable: bool,
    position: u64,
}

impl HttpRangeFile {
    /// Probes the resource and opens a stream positioned at 0.
    ///
    /// Fails if the probe fails or returns a non-success status.
    pub async fn open(client: RangeClient) -> Result<Self> {
        let meta = client.probe().await?;

        if let AcceptRanges::Unknown(value) = &meta.accept_ranges {
            warn!(
                parent: client.span(),
                value = %value,
                "Unknown Accept-Ranges value, treating resource as non-seekable"
            );
        }

        Ok(Self {
            url: client.url().clone(),
            span: client.span().clone(),
            client: Some(client),
            size: meta.size,
            last_modified: meta.last_modified,
            seekable: meta.is_seekable(),
            position: 0,
        })
    }

    /// Size declared by the server at open time.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    /// Positional read: fetches exactly `[offset, offset + len - 1]`.
    ///
    /// Returns an empty buffer without a request when `len` is 0 or `offset`
    /// is at or past the declared size. The cursor ends up after the bytes
    /// returned.
    pub async fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes> {
        self.ensure_open()?;
        self.position = offset;
        if len == 0 || offset >= self.size {
            return Ok(Bytes::new());
        }
        let end = offset.saturating_add(len as u64 - 1);
        self.fetch_from_cursor(end).await
    }

    fn ensure_open(&self) -> Result<&RangeClient> {
        self.client.as_ref().ok_or(HttpFsError::Closed)
    }

    /// Last byte a read of `len` bytes may touch. Requires `position < size` and `len > 0`.
    fn bounded_end(&self, len: usize) -> u64 {
        self.position
            .saturating_add(len as u64 - 1)
            .min(self.size - 1)
    }

    async fn fetch_from_cursor(&mut self, end: u64) -> Result<Bytes> {
        let client = self.ensure_open()?;
        let data = client.fetch(self.position, end).await?;
        self.position += data.len() as u64;
        Ok(data)
    }
}

impl RangeStream for HttpRangeFile {
    async fn read(&mut self, limit: Option<usize>) -> Result<Bytes> {
        self.ensure_open()?;
        if limit == Some(0) || self.position >= self.size {
            return Ok(Bytes::new());
        }
        let end = match limit {
            Some(len) => self.bounded_end(len),
            None => self.size - 1,
        };
        self.fetch_from_cursor(end).await
    }

    async fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        if buf.is_empty() || self.position >= self.size {
            return Ok(0);
        }
        let end = self.bounded_end(buf.len());
        let data = self.fetch_from_cursor(end).await?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.size) + i128::from(delta),
        };
        let position = u64::try_from(target).map_err(|_| HttpFsError::InvalidSeek(target))?;
        self.position = position;
        Ok(position)
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            debug!(parent: &self.span, "stream closed");
        }
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }
}

/// Opens `url` as an [`HttpRangeFile`].
///
/// Only read modes are accepted: `mode` may consist of `r`, `b` and `t` and
/// must contain `r`. Anything else (notably `w`, `a`, `+`) is rejected before
/// any request is made.
pub async fn open_url(url: &str, mode: &str, options: &ClientOptions) -> Result<HttpRangeFile> {
    let read_only = mode.contains('r') && mode.chars().all(|c| matches!(c, 'r' | 'b' | 't'));
    if !read_only {
        return Err(HttpFsError::UnsupportedMode(mode.to_string()));
    }
    let parsed = Url::parse(url).map_err(|source| HttpFsError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    HttpRangeFile::open(RangeClient::new(parsed, options)?).await
}
