//! Read-only access to remote HTTP resources through byte-range requests.
//!
//! This crate holds the network-facing half of tempofs:
//!
//! - [`http::HttpRangeFile`]: a seekable byte stream over one URL that
//!   fetches data on demand with `Range` requests, one request per read
//! - [`http::RangeClient`]: the per-resource HTTP session (metadata probe
//!   and ranged fetch)
//! - [`registry::ResourceRegistry`]: the ordered, immutable set of named
//!   resources with their inode numbers
//! - [`config::ResourceConfig`]: the name to URL mapping loaded at startup
//!
//! # Usage
//!
//! ```ignore
//! use tempofs_core::{ClientOptions, RangeStream, open_url};
//! use std::io::SeekFrom;
//!
//! let mut file = open_url("https://example.test/data.bin", "rb", &ClientOptions::default()).await?;
//! file.seek(SeekFrom::Start(1024))?;
//! let chunk = file.read(Some(512)).await?;
//! file.close();
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod registry;

pub use config::ResourceConfig;
pub use error::{ConfigError, HttpFsError, ResolveError, Result};
pub use http::{
    AcceptRanges, ClientOptions, HttpRangeFile, RangeClient, RangeStream, ResourceMeta, open_url,
};
pub use registry::{ROOT_INODE, RemoteResource, ResourceRegistry};
