//! Filesystem operations in terms of the registry and range-backed streams.
//!
//! [`HttpFs`] knows nothing about fuser sessions or reply objects: every
//! operation takes plain arguments and returns a [`FsResult`], which keeps it
//! testable without mounting anything. The [`TempoFS`](crate::TempoFS)
//! adapter drives it from FUSE callbacks.
//!
//! Attributes are never cached here. Every attribute query, lookup, listing
//! step and open probes the server again, so callers see remote changes as
//! soon as the kernel TTL expires.

use crate::attr::{Ownership, dir_attr, file_attr};
use crate::error::{FsError, FsResult};
use crate::handles::{FileHandleTable, OpenFile};
use bytes::Bytes;
use fuser::FileAttr;
use std::sync::Arc;
use tempofs_core::{ROOT_INODE, RangeStream, RemoteResource, ResolveError, ResourceRegistry};
use tracing::{debug, trace, warn};

/// One step of a directory listing.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub attr: FileAttr,
    /// Index to resume the listing at.
    pub next_index: usize,
}

/// Result of a successful [`HttpFs::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedFile {
    pub fh: u64,
    /// The server did not advertise byte-range support.
    pub nonseekable: bool,
    /// Content is treated as immutable for the session, so cached pages
    /// may be kept across opens.
    pub keep_cache: bool,
}

/// Read-only filesystem over the configured remote resources.
#[derive(Debug)]
pub struct HttpFs {
    registry: ResourceRegistry,
    handles: FileHandleTable,
    owner: Ownership,
}

impl HttpFs {
    /// Creates a filesystem owned by the process's effective user and group.
    pub fn new(registry: ResourceRegistry) -> Self {
        Self::with_ownership(registry, Ownership::effective())
    }

    /// Creates a filesystem reporting `owner` on every entry.
    pub fn with_ownership(registry: ResourceRegistry, owner: Ownership) -> Self {
        Self {
            registry,
            handles: FileHandleTable::new(),
            owner,
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Number of currently open file handles.
    pub fn open_file_count(&self) -> usize {
        self.handles.len()
    }

    /// Attributes of the root directory.
    pub fn root_attributes(&self) -> FileAttr {
        dir_attr(ROOT_INODE, self.owner)
    }

    /// Attributes of `inode`, probing the server for resources.
    pub async fn get_attributes(&self, inode: u64) -> FsResult<FileAttr> {
        if inode == ROOT_INODE {
            return Ok(self.root_attributes());
        }
        let resource = self.registry.resolve_by_inode(inode)?;
        self.probe_attributes(resource).await
    }

    /// Resolves `name` under `parent`. Only the root has children.
    pub async fn lookup(&self, parent: u64, name: &str) -> FsResult<FileAttr> {
        if parent != ROOT_INODE {
            return Err(FsError::NotInRoot {
                parent,
                name: name.to_string(),
            });
        }
        let resource = self.registry.resolve_by_name(name)?;
        self.probe_attributes(resource).await
    }

    /// Opens a directory. Only the root can be opened; its handle is the root inode.
    pub fn open_directory(&self, inode: u64) -> FsResult<u64> {
        if inode == ROOT_INODE {
            Ok(ROOT_INODE)
        } else {
            Err(ResolveError::UnknownInode(inode).into())
        }
    }

    /// Checks that `fh` is a directory handle returned by [`open_directory`](Self::open_directory).
    pub fn check_directory_handle(&self, fh: u64) -> FsResult<()> {
        if fh == ROOT_INODE {
            Ok(())
        } else {
            Err(FsError::InvalidHandle(fh))
        }
    }

    /// Returns the listing entry at `index` with fresh attributes.
    ///
    /// Past the last entry this fails with a "no such entry" error, which is
    /// how the end of the listing is signalled.
    pub async fn read_directory(&self, fh: u64, index: usize) -> FsResult<DirEntry> {
        self.check_directory_handle(fh)?;
        let resource = self.registry.entry_at(index)?;
        let attr = self.probe_attributes(resource).await?;
        Ok(DirEntry {
            name: resource.name().to_string(),
            attr,
            next_index: index + 1,
        })
    }

    /// Opens a resource for reading.
    ///
    /// Any flag implying write intent is refused before a stream is created.
    /// Opening the root fails with `EISDIR` rather than `ENOENT`: the root
    /// does exist, it just is not a file.
    pub async fn open(&self, inode: u64, flags: i32) -> FsResult<OpenedFile> {
        if has_write_intent(flags) {
            warn!(
                inode,
                flags,
                "Refusing write-intent open on read-only filesystem"
            );
            return Err(FsError::PermissionDenied { inode, flags });
        }
        if inode == ROOT_INODE {
            return Err(FsError::IsDirectory(inode));
        }

        let resource = self.registry.resolve_by_inode(inode)?;
        let stream = resource.open_stream().await?;
        let nonseekable = !stream.is_seekable();
        if nonseekable {
            warn!(
                parent: resource.client().span(),
                name = resource.name(),
                "Resource does not support range requests, opening as non-seekable"
            );
        }

        let fh = self
            .handles
            .insert_auto(Arc::new(OpenFile::new(inode, resource.name(), stream)));
        debug!(inode, fh, nonseekable, "open");
        Ok(OpenedFile {
            fh,
            nonseekable,
            keep_cache: true,
        })
    }

    /// Reads `size` bytes at `offset` with a single ranged fetch.
    ///
    /// Short reads happen only at end of file. End of file is the size probed
    /// when the handle was opened: reads at or past it return empty without a
    /// request, even if the remote resource has grown since. A fresh open
    /// sees the new size.
    pub async fn read(&self, fh: u64, offset: i64, size: u32) -> FsResult<Bytes> {
        let offset = u64::try_from(offset).map_err(|_| FsError::InvalidOffset(offset))?;
        let file = self.handles.get(fh).ok_or(FsError::InvalidHandle(fh))?;
        trace!(fh, inode = file.inode(), offset, size, "read");

        let mut stream = file.stream().lock().await;
        let data = stream.read_at(offset, size as usize).await?;
        Ok(data)
    }

    /// Closes the stream behind `fh` and forgets the handle.
    pub async fn release(&self, fh: u64) -> FsResult<()> {
        let file = self.handles.remove(fh).ok_or(FsError::InvalidHandle(fh))?;
        file.stream().lock().await.close();
        trace!(fh, name = file.name(), "release");
        Ok(())
    }

    /// Permission check. Everything is readable; nothing is writable.
    pub fn access(&self, inode: u64, mask: i32) -> FsResult<()> {
        if inode != ROOT_INODE {
            self.registry.resolve_by_inode(inode)?;
        }
        if mask & libc::W_OK != 0 {
            return Err(FsError::PermissionDenied { inode, flags: mask });
        }
        Ok(())
    }

    async fn probe_attributes(&self, resource: &RemoteResource) -> FsResult<FileAttr> {
        let meta = resource.probe().await?;
        Ok(file_attr(resource.inode(), &meta, self.owner))
    }
}

/// Whether open `flags` ask for anything beyond plain reading.
pub fn has_write_intent(flags: i32) -> bool {
    (flags & libc::O_ACCMODE) != libc::O_RDONLY || (flags & (libc::O_APPEND | libc::O_TRUNC)) != 0
}
