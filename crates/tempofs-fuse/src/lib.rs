//! FUSE filesystem exposing remote HTTP resources as read-only files.
//!
//! A configuration maps file names to URLs. The mounted directory lists one
//! regular file per entry; reading a file issues an HTTP range request for
//! exactly the bytes the kernel asked for, so nothing is downloaded up front.
//!
//! # Features
//!
//! - Flat, read-only namespace under a single root directory
//! - Attributes probed from `HEAD` responses on every lookup
//! - One ranged `GET` per read, no caching of fetched data
//! - Non-blocking callbacks: every network-bound operation runs as its own task
//!
//! # Usage
//!
//! ```ignore
//! use tempofs_core::{ResourceConfig, ResourceRegistry};
//! use tempofs_fuse::{HttpFs, MountConfig, TempoFS};
//!
//! let config = MountConfig::default();
//! let resources = ResourceConfig::load(path)?;
//! let registry = ResourceRegistry::from_config(&resources, &config.client_options())?;
//! let fs = TempoFS::new(HttpFs::new(registry), config)?;
//! let session = fuser::spawn_mount2(fs, mountpoint, &options)?;
//! ```

pub mod async_bridge;
pub mod attr;
pub mod bridge;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod handles;
pub mod logging;

pub use async_bridge::BridgeStats;
pub use attr::Ownership;
pub use bridge::{DirEntry, HttpFs, OpenedFile};
pub use config::MountConfig;
pub use error::{FsError, FsResult, ToErrno};
pub use filesystem::TempoFS;
pub use handles::{FileHandleTable, HandleTable, OpenFile};
