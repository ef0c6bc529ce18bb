//! FUSE adapter for [`HttpFs`].
//!
//! This module implements the fuser `Filesystem` trait. Callbacks that can
//! touch the network (lookup, getattr, open, read, readdir, release) are
//! dispatched as independent tasks on the tokio runtime and answer the
//! kernel from there; purely local callbacks reply inline.
//!
//! | Operation | Notes |
//! |-----------|-------|
//! | init/destroy | destroy notifies the mount owner so it can exit |
//! | lookup | root only; re-probes the resource |
//! | getattr | root answered inline; resources re-probed |
//! | open/release | write intent refused with `EACCES` |
//! | read | one ranged fetch per call |
//! | opendir/readdir/releasedir | root only; `.` and `..` synthesized |
//! | statfs | read-only, file count = resource count |
//! | access | `W_OK` refused with `EACCES` |

use crate::async_bridge::{BridgeStats, dispatch};
use crate::attr::BLOCK_SIZE;
use crate::bridge::{HttpFs, OpenedFile};
use crate::config::MountConfig;
use crate::error::{FsError, FsResult};
use bytes::Bytes;
use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, Request,
};
use libc::c_int;
use std::ffi::OsStr;
use std::sync::{Arc, mpsc};
use tempofs_core::ROOT_INODE;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info, trace, warn};

/// Maximum filename length reported by statfs.
const MAX_NAME_LEN: u32 = 255;

/// Number of synthesized entries (`.` and `..`) ahead of the resources.
const DOT_ENTRIES: usize = 2;

/// FUSE filesystem over remote HTTP resources.
pub struct TempoFS {
    /// Handle to tokio runtime for dispatched operations.
    /// Points to either our owned runtime or an external one.
    handle: Handle,
    /// Shared with every dispatched task.
    fs: Arc<HttpFs>,
    /// Statistics for dispatched operations.
    stats: Arc<BridgeStats>,
    /// Mount configuration (TTLs, timeouts).
    config: MountConfig,
    /// Told when the kernel tears the mount down.
    destroyed: Option<mpsc::Sender<()>>,
    /// Owned tokio runtime (when we create our own).
    /// Declared last so it drops after everything that may hold runtime resources.
    _owned_runtime: Option<Runtime>,
}

impl TempoFS {
    /// Creates the filesystem with its own multi-threaded runtime.
    pub fn new(fs: HttpFs, config: MountConfig) -> FsResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("tempofs-io")
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self::with_runtime_internal(fs, config, Some(runtime), handle))
    }

    /// Creates the filesystem on an existing runtime.
    ///
    /// The runtime must outlive the filesystem.
    pub fn with_runtime_handle(fs: HttpFs, config: MountConfig, handle: Handle) -> Self {
        Self::with_runtime_internal(fs, config, None, handle)
    }

    fn with_runtime_internal(
        fs: HttpFs,
        config: MountConfig,
        owned_runtime: Option<Runtime>,
        handle: Handle,
    ) -> Self {
        info!(
            resources = fs.registry().len(),
            attr_ttl_ms = config.attr_ttl.as_millis(),
            io_timeout_secs = config.io_timeout.as_secs(),
            "TempoFS initialized"
        );
        Self {
            handle,
            fs: Arc::new(fs),
            stats: BridgeStats::new(),
            config,
            destroyed: None,
            _owned_runtime: owned_runtime,
        }
    }

    /// Sends on `tx` once the filesystem is destroyed (unmounted).
    #[must_use]
    pub fn notify_on_destroy(mut self, tx: mpsc::Sender<()>) -> Self {
        self.destroyed = Some(tx);
        self
    }

    /// Returns statistics for dispatched operations.
    pub fn bridge_stats(&self) -> &BridgeStats {
        &self.stats
    }

    pub fn filesystem(&self) -> &Arc<HttpFs> {
        &self.fs
    }
}

/// Flags for `reply.opened` derived from an open result.
pub fn open_reply_flags(opened: &OpenedFile) -> u32 {
    let mut flags = 0;
    if opened.keep_cache {
        flags |= fuser::consts::FOPEN_KEEP_CACHE;
    }
    if opened.nonseekable {
        flags |= fuser::consts::FOPEN_NONSEEKABLE;
    }
    flags
}

/// One directory entry as handed to `ReplyDirectory::add`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ListingEntry {
    pub inode: u64,
    /// Kernel offset of the entry after this one.
    pub offset: i64,
    pub kind: FileType,
    pub name: String,
}

impl ListingEntry {
    fn dot(name: &str, offset: i64) -> Self {
        Self {
            inode: ROOT_INODE,
            offset,
            kind: FileType::Directory,
            name: name.to_string(),
        }
    }
}

/// Kernel offset that resumes the listing at resource `index`.
fn kernel_offset(index: usize) -> i64 {
    i64::try_from(index + DOT_ENTRIES).unwrap_or(i64::MAX)
}

/// Entries from kernel `offset` to the end of the root listing.
///
/// Drives the bridge one entry at a time until it reports "no such entry",
/// which ends the listing normally. An entry whose probe fails is still
/// listed, since name, inode and type are known without the network; the
/// failure shows up on the next lookup or getattr of that entry instead.
pub(crate) async fn collect_listing(
    fs: &HttpFs,
    fh: u64,
    offset: i64,
) -> FsResult<Vec<ListingEntry>> {
    fs.check_directory_handle(fh)?;
    let offset = usize::try_from(offset).map_err(|_| FsError::InvalidOffset(offset))?;

    let mut entries = Vec::new();
    if offset == 0 {
        entries.push(ListingEntry::dot(".", 1));
    }
    if offset <= 1 {
        entries.push(ListingEntry::dot("..", 2));
    }

    let mut index = offset.saturating_sub(DOT_ENTRIES);
    loop {
        match fs.read_directory(fh, index).await {
            Ok(entry) => {
                entries.push(ListingEntry {
                    inode: entry.attr.ino,
                    offset: kernel_offset(entry.next_index),
                    kind: entry.attr.kind,
                    name: entry.name,
                });
                index = entry.next_index;
            }
            Err(e) if e.is_not_found() => break,
            Err(e) => {
                let resource = fs.registry().entry_at(index)?;
                warn!(
                    parent: resource.client().span(),
                    name = resource.name(),
                    error = %e,
                    "Probe failed while listing, entry listed without attributes"
                );
                index += 1;
                entries.push(ListingEntry {
                    inode: resource.inode(),
                    offset: kernel_offset(index),
                    kind: FileType::RegularFile,
                    name: resource.name().to_string(),
                });
            }
        }
    }
    Ok(entries)
}

impl Filesystem for TempoFS {
    fn init(&mut self, _req: &Request<'_>, config: &mut KernelConfig) -> Result<(), c_int> {
        info!("FUSE filesystem initialized");

        // Reads on different handles are independent
        config.add_capabilities(fuser::consts::FUSE_ASYNC_READ).ok();
        Ok(())
    }

    fn destroy(&mut self) {
        info!("FUSE filesystem destroyed");
        if let Some(tx) = self.destroyed.take() {
            // Receiver may already be gone if the owner is shutting down
            let _ = tx.send(());
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        // Configured names are UTF-8, so anything else cannot match
        let Some(name) = name.to_str().map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        trace!(parent = parent, name = %name, "lookup");

        let fs = Arc::clone(&self.fs);
        let ttl = self.config.attr_ttl;
        dispatch(
            &self.handle,
            &self.stats,
            "lookup",
            reply,
            async move { fs.lookup(parent, &name).await },
            move |reply: ReplyEntry, attr: FileAttr| reply.entry(&ttl, &attr, 0),
        );
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(inode = ino, "getattr");
        let ttl = self.config.attr_ttl;

        if ino == ROOT_INODE {
            reply.attr(&ttl, &self.fs.root_attributes());
            return;
        }

        let fs = Arc::clone(&self.fs);
        dispatch(
            &self.handle,
            &self.stats,
            "getattr",
            reply,
            async move { fs.get_attributes(ino).await },
            move |reply: ReplyAttr, attr: FileAttr| reply.attr(&ttl, &attr),
        );
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, flags, "open");
        let fs = Arc::clone(&self.fs);
        dispatch(
            &self.handle,
            &self.stats,
            "open",
            reply,
            async move { fs.open(ino, flags).await },
            |reply: ReplyOpen, opened: OpenedFile| {
                reply.opened(opened.fh, open_reply_flags(&opened));
            },
        );
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(inode = ino, fh, offset, size, "read");
        let fs = Arc::clone(&self.fs);
        dispatch(
            &self.handle,
            &self.stats,
            "read",
            reply,
            async move { fs.read(fh, offset, size).await },
            |reply: ReplyData, data: Bytes| reply.data(&data),
        );
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!(inode = ino, fh, "release");
        let fs = Arc::clone(&self.fs);
        dispatch(
            &self.handle,
            &self.stats,
            "release",
            reply,
            async move { fs.release(fh).await },
            |reply: ReplyEmpty, ()| reply.ok(),
        );
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, "opendir");
        match self.fs.open_directory(ino) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        reply: ReplyDirectory,
    ) {
        trace!(inode = ino, fh, offset, "readdir");
        let fs = Arc::clone(&self.fs);
        dispatch(
            &self.handle,
            &self.stats,
            "readdir",
            reply,
            async move { collect_listing(&fs, fh, offset).await },
            |mut reply: ReplyDirectory, entries: Vec<ListingEntry>| {
                for entry in entries {
                    // add returns true once the kernel buffer is full
                    if reply.add(entry.inode, entry.offset, entry.kind, &entry.name) {
                        break;
                    }
                }
                reply.ok();
            },
        );
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let files = self.fs.registry().len() as u64;
        debug!(files, "statfs");
        reply.statfs(
            0,            // blocks
            0,            // bfree
            0,            // bavail
            files,        // files
            0,            // ffree
            BLOCK_SIZE,   // bsize
            MAX_NAME_LEN, // namelen
            BLOCK_SIZE,   // frsize
        );
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        trace!(inode = ino, mask, "access");
        match self.fs.access(ino, mask) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }
}
