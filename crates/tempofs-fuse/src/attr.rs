//! File attribute construction.

use fuser::{FileAttr, FileType};
use std::time::{SystemTime, UNIX_EPOCH};
use tempofs_core::ResourceMeta;

/// Block size reported in attributes and filesystem statistics.
pub const BLOCK_SIZE: u32 = 4096;

/// Root directory permissions (rwxr-xr-x).
pub const DIR_PERM: u16 = 0o755;

/// Resource file permissions (r--r--r--).
pub const FILE_PERM: u16 = 0o444;

/// Owner reported for every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

impl Ownership {
    /// Effective user and group of the current process.
    pub fn effective() -> Self {
        Self {
            uid: nix::unistd::geteuid().as_raw(),
            gid: nix::unistd::getegid().as_raw(),
        }
    }
}

/// Attributes of the synthetic root directory.
pub fn dir_attr(inode: u64, owner: Ownership) -> FileAttr {
    FileAttr {
        ino: inode,
        size: 0,
        blocks: 0,
        atime: UNIX_EPOCH,
        mtime: UNIX_EPOCH,
        ctime: UNIX_EPOCH,
        crtime: UNIX_EPOCH,
        kind: FileType::Directory,
        perm: DIR_PERM,
        nlink: 2,
        uid: owner.uid,
        gid: owner.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

/// Attributes of a resource, from a fresh probe.
///
/// Every timestamp is the resource's `Last-Modified`, or the epoch when the
/// server did not send one.
pub fn file_attr(inode: u64, meta: &ResourceMeta, owner: Ownership) -> FileAttr {
    let time: SystemTime = meta.last_modified.unwrap_or(UNIX_EPOCH);
    FileAttr {
        ino: inode,
        size: meta.size,
        blocks: meta.size.div_ceil(u64::from(BLOCK_SIZE)),
        atime: time,
        mtime: time,
        ctime: time,
        crtime: time,
        kind: FileType::RegularFile,
        perm: FILE_PERM,
        nlink: 1,
        uid: owner.uid,
        gid: owner.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}
