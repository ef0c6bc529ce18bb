//! Error types for the tempofs core crate.
//!
//! Three failure domains are kept apart: [`HttpFsError`] for anything that
//! touches the network or a stream, [`ConfigError`] for startup
//! configuration problems, and [`ResolveError`] for name/identifier lookups
//! against the registry.

use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias for stream and HTTP operations.
pub type Result<T, E = HttpFsError> = std::result::Result<T, E>;

/// Errors raised while probing or reading a remote resource.
#[derive(Debug, Error)]
pub enum HttpFsError {
    /// The request could not be completed (DNS, connect, TLS, timeout, body read).
    #[error("HTTP transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: StatusCode },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// A URL string could not be parsed.
    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Seek target is negative or does not fit a stream position.
    #[error("Invalid seek target: {0}")]
    InvalidSeek(i128),

    /// The stream was used after `close()`.
    #[error("Stream is closed")]
    Closed,

    /// Open mode implies write access.
    #[error("Unsupported open mode {0:?}: only read modes are supported")]
    UnsupportedMode(String),
}

impl HttpFsError {
    /// Returns true if the underlying transport gave up because of a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpFsError::Transport { source, .. } if source.is_timeout())
    }

    /// Returns the HTTP status for status failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpFsError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised while loading the resource mapping.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Duplicate entry name {0:?}")]
    DuplicateName(String),

    #[error("Invalid URL for {name:?}: {source}")]
    InvalidUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme {scheme:?} for {name:?} (expected http or https)")]
    UnsupportedScheme { name: String, scheme: String },
}

/// Lookup failures against the resource registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("No entry with identifier {0}")]
    UnknownInode(u64),

    #[error("No entry named {0:?}")]
    UnknownName(String),

    #[error("Directory index {0} is past the end of the listing")]
    IndexOutOfRange(usize),
}
