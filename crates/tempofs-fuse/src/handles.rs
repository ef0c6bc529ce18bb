//! File handles for open remote resources.
//!
//! Each successful `open` gets its own [`OpenFile`] with an independent
//! stream cursor. The stream sits behind an async mutex so concurrent reads
//! on one handle never interleave their cursor updates, while reads on
//! different handles proceed in parallel.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tempofs_core::HttpRangeFile;
use tokio::sync::Mutex;

/// Thread-safe handle table with auto-incrementing IDs.
///
/// IDs start at 1 (0 is reserved for invalid/null handle) and are never
/// handed out twice while the previous holder is still open.
#[derive(Debug)]
pub struct HandleTable<V> {
    handles: DashMap<u64, V>,
    next_id: AtomicU64,
}

impl<V> HandleTable<V> {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a value and return its new handle ID.
    pub fn insert_auto(&self, value: V) -> u64 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id == 0 {
                continue;
            }
            if let Entry::Vacant(entry) = self.handles.entry(id) {
                entry.insert(value);
                return id;
            }
        }
    }

    /// Remove a handle, returning its value.
    pub fn remove(&self, id: u64) -> Option<V> {
        self.handles.remove(&id).map(|(_, value)| value)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<V: Clone> HandleTable<V> {
    /// Clone of the value behind `id`. The map lock is released before returning.
    pub fn get(&self, id: u64) -> Option<V> {
        self.handles.get(&id).map(|value| value.clone())
    }
}

impl<V> Default for HandleTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// State behind one file handle.
#[derive(Debug)]
pub struct OpenFile {
    inode: u64,
    name: String,
    stream: Mutex<HttpRangeFile>,
}

impl OpenFile {
    pub fn new(inode: u64, name: impl Into<String>, stream: HttpRangeFile) -> Self {
        Self {
            inode,
            name: name.into(),
            stream: Mutex::new(stream),
        }
    }

    pub fn inode(&self) -> u64 {
        self.inode
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exclusive access to the stream for one read.
    pub fn stream(&self) -> &Mutex<HttpRangeFile> {
        &self.stream
    }
}

/// Table of open files keyed by FUSE file handle.
pub type FileHandleTable = HandleTable<Arc<OpenFile>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let table: HandleTable<&str> = HandleTable::new();
        let first = table.insert_auto("a");
        let second = table.insert_auto("b");
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_get_and_remove() {
        let table: HandleTable<Arc<String>> = HandleTable::new();
        let id = table.insert_auto(Arc::new("doc".to_string()));

        assert!(table.contains(id));
        assert_eq!(table.get(id).as_deref().map(String::as_str), Some("doc"));
        assert_eq!(table.remove(id).as_deref().map(String::as_str), Some("doc"));
        assert!(table.get(id).is_none());
        assert!(table.remove(id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let table: HandleTable<u8> = HandleTable::new();
        let id = table.insert_auto(1);
        table.remove(id);
        let next = table.insert_auto(2);
        assert_ne!(id, next);
    }

    #[test]
    fn test_wraparound_skips_zero_and_live_ids() {
        let table: HandleTable<u8> = HandleTable::new();
        let live = table.insert_auto(1);
        table.next_id.store(u64::MAX, Ordering::Relaxed);

        assert_eq!(table.insert_auto(2), u64::MAX);
        // 0 is reserved and 1 is still open
        let wrapped = table.insert_auto(3);
        assert_ne!(wrapped, 0);
        assert_ne!(wrapped, live);
        assert_eq!(wrapped, 2);
    }

    #[test]
    fn test_concurrent_inserts_are_unique() {
        let table = Arc::new(HandleTable::<usize>::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|i| table.insert_auto(t * 100 + i))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = threads
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 800);
    }
}
