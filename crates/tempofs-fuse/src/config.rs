//! Mount configuration for the FUSE filesystem.

use std::time::Duration;
use tempofs_core::ClientOptions;

/// Default kernel TTL for attributes and entries (1 second).
///
/// Attributes are re-probed on every lookup, so a long TTL only hides
/// remote changes from the kernel for longer.
pub const DEFAULT_ATTR_TTL: Duration = Duration::from_secs(1);

/// Default transport timeout for a single HTTP request (30 seconds).
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Default filesystem name shown in the mount table.
pub const DEFAULT_FS_NAME: &str = "tempofs";

/// Configuration options for the FUSE filesystem.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Time-to-live the kernel may cache attributes and entries for.
    ///
    /// Default: 1 second.
    pub attr_ttl: Duration,

    /// Timeout for individual HTTP requests.
    ///
    /// Applied by the HTTP client; requests that exceed it fail with ETIMEDOUT.
    /// Default: 30 seconds.
    pub io_timeout: Duration,

    /// Filesystem name reported to the mount table (`FSName` option).
    pub fs_name: String,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            attr_ttl: DEFAULT_ATTR_TTL,
            io_timeout: DEFAULT_IO_TIMEOUT,
            fs_name: DEFAULT_FS_NAME.to_string(),
        }
    }
}

impl MountConfig {
    /// Sets the kernel TTL for attributes and entries.
    #[must_use]
    pub fn attr_ttl(mut self, ttl: Duration) -> Self {
        self.attr_ttl = ttl;
        self
    }

    /// Sets the timeout for individual HTTP requests.
    #[must_use]
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the filesystem name reported to the mount table.
    #[must_use]
    pub fn fs_name(mut self, name: impl Into<String>) -> Self {
        self.fs_name = name.into();
        self
    }

    /// HTTP client options derived from this configuration.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::default().timeout(Some(self.io_timeout))
    }
}
