//! Node id to virtual path mapping.
//!
//! A passthrough tree spans every host filesystem mounted beneath its root,
//! and inode numbers are only unique per device. Nodes are therefore keyed by
//! [`HostKey`] (`st_dev`, `st_ino`), and each key is given a node id for the
//! kernel:
//!
//! - the mount root is always [`ROOT_NODE`]
//! - any other object gets its host inode number, when that number is
//!   neither [`ROOT_NODE`] nor held by another key
//! - otherwise an id is allocated from [`FIRST_ALLOCATED_NODE`] upwards
//!
//! The inode-1 case is common: procfs, sysfs, devtmpfs, devpts and tmpfs
//! roots all report it.
//!
//! Each node remembers the virtual path it was last looked up under and how
//! many kernel references (`nlookup`) it holds, and is evicted when the
//! kernel forgets all of them. Hard links share a key and resolve to the
//! most recently looked-up path.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use oxpass_core::Attr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Node id of the mount root (FUSE convention).
pub const ROOT_NODE: u64 = 1;

/// First id handed out when a host inode number cannot be used as-is.
///
/// Host inode numbers at or above this value are never used as node ids.
pub const FIRST_ALLOCATED_NODE: u64 = 1 << 63;

/// Identity of a host object: device and inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostKey {
    /// `st_dev`
    pub dev: u64,
    /// `st_ino`
    pub ino: u64,
}

impl HostKey {
    /// Creates a key.
    pub const fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }
}

impl From<&Attr> for HostKey {
    fn from(attr: &Attr) -> Self {
        Self::new(attr.dev, attr.ino)
    }
}

#[derive(Debug)]
struct NodeEntry {
    path: PathBuf,
    key: Option<HostKey>,
    nlookup: u64,
}

/// Thread-safe node table with lookup counting.
#[derive(Debug)]
pub struct NodeTable {
    nodes: DashMap<u64, NodeEntry>,
    ids: DashMap<HostKey, u64>,
    next_allocated: AtomicU64,
}

impl NodeTable {
    /// Creates a table containing only the root, mapped to `/`.
    pub fn new() -> Self {
        let nodes = DashMap::new();
        nodes.insert(
            ROOT_NODE,
            NodeEntry {
                path: PathBuf::from("/"),
                key: None,
                nlookup: 1,
            },
        );
        Self {
            nodes,
            ids: DashMap::new(),
            next_allocated: AtomicU64::new(FIRST_ALLOCATED_NODE),
        }
    }

    /// Records a kernel reference to the object at `path` and returns its id.
    ///
    /// Increments the lookup count and points the node at `path`.
    pub fn remember(&self, path: &Path, key: HostKey) -> u64 {
        if path == Path::new("/") {
            return ROOT_NODE;
        }

        // The key's shard stays locked until the node is updated, so a
        // concurrent forget of the same key cannot interleave.
        match self.ids.entry(key) {
            Entry::Occupied(slot) => {
                let id = *slot.get();
                self.nodes
                    .entry(id)
                    .and_modify(|entry| {
                        entry.nlookup += 1;
                        if entry.path != path {
                            entry.path = path.to_path_buf();
                        }
                    })
                    .or_insert_with(|| NodeEntry {
                        path: path.to_path_buf(),
                        key: Some(key),
                        nlookup: 1,
                    });
                id
            }
            Entry::Vacant(slot) => {
                let id = self.claim_id(path, key);
                slot.insert(id);
                id
            }
        }
    }

    /// Inserts a fresh node for `key`, preferring its host inode number.
    fn claim_id(&self, path: &Path, key: HostKey) -> u64 {
        let entry = || NodeEntry {
            path: path.to_path_buf(),
            key: Some(key),
            nlookup: 1,
        };

        if key.ino != ROOT_NODE
            && key.ino < FIRST_ALLOCATED_NODE
            && let Entry::Vacant(slot) = self.nodes.entry(key.ino)
        {
            slot.insert(entry());
            return key.ino;
        }

        loop {
            let id = self.next_allocated.fetch_add(1, Ordering::Relaxed);
            if id < FIRST_ALLOCATED_NODE {
                // Wrapped; start the range over.
                self.next_allocated
                    .store(FIRST_ALLOCATED_NODE, Ordering::Relaxed);
                continue;
            }
            if let Entry::Vacant(slot) = self.nodes.entry(id) {
                slot.insert(entry());
                tracing::trace!(
                    node = id,
                    dev = key.dev,
                    ino = key.ino,
                    path = %path.display(),
                    "Allocated node id"
                );
                return id;
            }
        }
    }

    /// Virtual path last associated with `id`.
    pub fn path(&self, id: u64) -> Option<PathBuf> {
        self.nodes.get(&id).map(|entry| entry.path.clone())
    }

    /// Host key of `id` (`None` for the root and unknown ids).
    pub fn key(&self, id: u64) -> Option<HostKey> {
        self.nodes.get(&id).and_then(|entry| entry.key)
    }

    /// Current lookup count of `id` (0 if unknown).
    pub fn nlookup(&self, id: u64) -> u64 {
        self.nodes.get(&id).map_or(0, |entry| entry.nlookup)
    }

    /// Drops `count` kernel references to `id`.
    ///
    /// Returns true if the node was evicted. The root is never evicted.
    pub fn forget(&self, id: u64, count: u64) -> bool {
        if id == ROOT_NODE {
            return false;
        }

        let (remaining, key) = match self.nodes.get_mut(&id) {
            Some(mut entry) => {
                entry.nlookup = entry.nlookup.saturating_sub(count);
                (entry.nlookup, entry.key)
            }
            None => return false,
        };
        if remaining > 0 {
            return false;
        }

        // Same lock order as `remember`: key shard first, then the node.
        let evicted = match key.map(|key| self.ids.entry(key)) {
            Some(Entry::Occupied(slot)) if *slot.get() == id => {
                let evicted = self.nodes.remove_if(&id, |_, entry| entry.nlookup == 0);
                if evicted.is_some() {
                    slot.remove();
                }
                evicted
            }
            _ => self.nodes.remove_if(&id, |_, entry| entry.nlookup == 0),
        };
        if let Some((_, entry)) = &evicted {
            tracing::trace!(node = id, path = %entry.path.display(), "Evicted node");
        }
        evicted.is_some()
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root node is permanent.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}
