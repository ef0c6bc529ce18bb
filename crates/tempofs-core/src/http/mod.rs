//! HTTP access to remote resources.
//!
//! [`RangeClient`] owns the HTTP session for one URL and knows how to issue
//! the two requests the filesystem needs: a metadata probe (`HEAD`) and a
//! ranged fetch (`GET` with `Range: bytes=a-b`). [`HttpRangeFile`] layers a
//! cursor on top of it and implements the [`RangeStream`] capability.

mod client;
mod stream;

pub use client::{AcceptRanges, ClientOptions, RangeClient, ResourceMeta, range_header};
pub use stream::{HttpRangeFile, RangeStream, open_url};
