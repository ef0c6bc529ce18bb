//! Ordered registry of the configured remote resources.
//!
//! Identifiers are assigned once at construction: the entry at configuration
//! index `i` gets inode `ROOT_INODE + 1 + i`. The registry is immutable after
//! construction and can be shared freely between concurrent operations.

use crate::config::ResourceConfig;
use crate::error::{ResolveError, Result};
use crate::http::{ClientOptions, HttpRangeFile, RangeClient, ResourceMeta};
use tracing::info_span;
use url::Url;

/// Identifier of the synthetic root directory (FUSE convention).
pub const ROOT_INODE: u64 = 1;

/// Inode assigned to the entry at `index`.
pub fn inode_for_index(index: usize) -> u64 {
    ROOT_INODE + 1 + index as u64
}

/// Registry index for `inode`, if the inode lies in the resource range.
pub fn index_for_inode(inode: u64) -> Option<usize> {
    inode
        .checked_sub(ROOT_INODE + 1)
        .and_then(|index| usize::try_from(index).ok())
}

/// One configured entry: a name in the root directory backed by a URL.
#[derive(Debug)]
pub struct RemoteResource {
    inode: u64,
    name: String,
    client: RangeClient,
    options: ClientOptions,
}

impl RemoteResource {
    pub fn inode(&self) -> u64 {
        self.inode
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        self.client.url()
    }

    /// The HTTP session used for probes of this resource.
    pub fn client(&self) -> &RangeClient {
        &self.client
    }

    /// Probes the server for current size, modification time and range support.
    ///
    /// Never cached: every call issues a fresh `HEAD`.
    pub async fn probe(&self) -> Result<ResourceMeta> {
        self.client.probe().await
    }

    /// Opens a new stream with its own cursor and its own HTTP session.
    ///
    /// The session is released when the stream is closed or dropped.
    pub async fn open_stream(&self) -> Result<HttpRangeFile> {
        let client = RangeClient::with_span(
            self.client.url().clone(),
            &self.options,
            self.client.span().clone(),
        )?;
        HttpRangeFile::open(client).await
    }
}

/// Immutable, insertion-ordered collection of [`RemoteResource`]s.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: Vec<RemoteResource>,
}

impl ResourceRegistry {
    /// Builds one resource (and one HTTP session) per configuration entry.
    ///
    /// No network traffic happens here; resources are probed lazily.
    pub fn from_config(config: &ResourceConfig, options: &ClientOptions) -> Result<Self> {
        let entries = config
            .iter()
            .enumerate()
            .map(|(index, (name, url))| -> Result<RemoteResource> {
                let span = info_span!("resource", name = %name, url = %url);
                let client = RangeClient::with_span(url.clone(), options, span)?;
                Ok(RemoteResource {
                    inode: inode_for_index(index),
                    name: name.to_string(),
                    client,
                    options: options.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Resolves an inode to its resource.
    pub fn resolve_by_inode(&self, inode: u64) -> Result<&RemoteResource, ResolveError> {
        index_for_inode(inode)
            .and_then(|index| self.entries.get(index))
            .ok_or(ResolveError::UnknownInode(inode))
    }

    /// Resolves a root-directory entry name to its resource.
    pub fn resolve_by_name(&self, name: &str) -> Result<&RemoteResource, ResolveError> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| ResolveError::UnknownName(name.to_string()))
    }

    /// Entry at listing position `index`.
    pub fn entry_at(&self, index: usize) -> Result<&RemoteResource, ResolveError> {
        self.entries
            .get(index)
            .ok_or(ResolveError::IndexOutOfRange(index))
    }

    /// Entries from `start` onwards in configuration order, with their indices.
    pub fn enumerate(&self, start: usize) -> impl Iterator<Item = (usize, &RemoteResource)> {
        self.entries.iter().enumerate().skip(start)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(pairs: &[(&str, &str)]) -> ResourceRegistry {
        let config = ResourceConfig::from_pairs(pairs.iter().copied()).unwrap();
        ResourceRegistry::from_config(&config, &ClientOptions::default()).unwrap()
    }

    #[test]
    fn test_inode_index_mapping() {
        assert_eq!(inode_for_index(0), 2);
        assert_eq!(inode_for_index(5), 7);
        assert_eq!(index_for_inode(2), Some(0));
        assert_eq!(index_for_inode(7), Some(5));
        assert_eq!(index_for_inode(ROOT_INODE), None);
        assert_eq!(index_for_inode(0), None);
    }

    #[test]
    fn test_identifiers_are_contiguous() {
        let reg = registry(&[
            ("a", "https://example.test/a"),
            ("b", "https://example.test/b"),
            ("c", "https://example.test/c"),
        ]);

        let inodes: Vec<u64> = reg.enumerate(0).map(|(_, r)| r.inode()).collect();
        assert_eq!(inodes, [2, 3, 4]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_resolve_by_inode() {
        let reg = registry(&[("doc", "https://example.test/readme.txt")]);

        let doc = reg.resolve_by_inode(2).unwrap();
        assert_eq!(doc.name(), "doc");
        assert_eq!(doc.url().as_str(), "https://example.test/readme.txt");

        assert_eq!(
            reg.resolve_by_inode(ROOT_INODE).unwrap_err(),
            ResolveError::UnknownInode(ROOT_INODE)
        );
        assert_eq!(
            reg.resolve_by_inode(3).unwrap_err(),
            ResolveError::UnknownInode(3)
        );
    }

    #[test]
    fn test_resolve_by_name() {
        let reg = registry(&[
            ("first", "https://example.test/1"),
            ("second", "https://example.test/2"),
        ]);

        assert_eq!(reg.resolve_by_name("second").unwrap().inode(), 3);
        assert_eq!(
            reg.resolve_by_name("third").unwrap_err(),
            ResolveError::UnknownName("third".to_string())
        );
    }

    #[test]
    fn test_enumerate_from_cursor() {
        let reg = registry(&[
            ("a", "https://example.test/a"),
            ("b", "https://example.test/b"),
            ("c", "https://example.test/c"),
        ]);

        let names: Vec<&str> = reg.enumerate(1).map(|(_, r)| r.name()).collect();
        assert_eq!(names, ["b", "c"]);
        assert_eq!(reg.enumerate(3).count(), 0);
        assert_eq!(reg.enumerate(10).count(), 0);

        assert_eq!(reg.entry_at(2).unwrap().name(), "c");
        assert_eq!(
            reg.entry_at(3).unwrap_err(),
            ResolveError::IndexOutOfRange(3)
        );
    }

    #[test]
    fn test_empty_registry() {
        let reg = ResourceRegistry::from_config(&ResourceConfig::default(), &ClientOptions::default())
            .unwrap();
        assert!(reg.is_empty());
        assert!(reg.entry_at(0).is_err());
    }
}
