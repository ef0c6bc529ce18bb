//! Error handling and errno mapping for the FUSE filesystem.
//!
//! Everything that crosses the kernel boundary ends up as a libc error code.
//! Resolution failures become `ENOENT`, write attempts `EACCES`, and HTTP
//! failures `EIO` (or `ETIMEDOUT` when the transport gave up on a timeout).

use std::io;
use tempofs_core::{HttpFsError, ResolveError};
use thiserror::Error;

/// Errors raised by filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// Identifier or name not present in the registry.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Lookup under something other than the root directory.
    #[error("No entry {name:?} under inode {parent}")]
    NotInRoot { parent: u64, name: String },

    /// Open with write intent on a read-only filesystem.
    #[error("Write access denied for inode {inode} (flags {flags:#o})")]
    PermissionDenied { inode: u64, flags: i32 },

    /// Unknown file handle, or a directory handle that is not the root.
    #[error("Invalid file handle: {0}")]
    InvalidHandle(u64),

    /// Tried to open the root directory as a file.
    #[error("Inode {0} is a directory")]
    IsDirectory(u64),

    /// Read offset the kernel sent cannot be a stream position.
    #[error("Invalid offset: {0}")]
    InvalidOffset(i64),

    /// Probe or fetch against the remote resource failed.
    #[error(transparent)]
    Http(#[from] HttpFsError),

    /// IO error (runtime construction).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Converts this error to a libc error code for FUSE.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::Resolve(e) => e.to_errno(),
            FsError::NotInRoot { .. } => libc::ENOENT,
            FsError::PermissionDenied { .. } => libc::EACCES,
            FsError::InvalidHandle(_) => libc::EBADF,
            FsError::IsDirectory(_) => libc::EISDIR,
            FsError::InvalidOffset(_) => libc::EINVAL,
            FsError::Http(e) => e.to_errno(),
            FsError::Io(e) => e.to_errno(),
        }
    }

    /// True for "no such entry" outcomes, which also mark the end of a listing.
    pub fn is_not_found(&self) -> bool {
        self.to_errno() == libc::ENOENT
    }
}

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for ResolveError {
    fn to_errno(&self) -> i32 {
        libc::ENOENT
    }
}

impl ToErrno for HttpFsError {
    fn to_errno(&self) -> i32 {
        match self {
            e if e.is_timeout() => libc::ETIMEDOUT,
            HttpFsError::Transport { .. } | HttpFsError::Status { .. } | HttpFsError::Client(_) => {
                libc::EIO
            }
            HttpFsError::InvalidUrl { .. } | HttpFsError::InvalidSeek(_) => libc::EINVAL,
            HttpFsError::Closed => libc::EBADF,
            HttpFsError::UnsupportedMode(_) => libc::EACCES,
        }
    }
}

impl ToErrno for io::Error {
    fn to_errno(&self) -> i32 {
        self.raw_os_error().unwrap_or(libc::EIO)
    }
}
