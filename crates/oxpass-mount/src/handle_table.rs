//! Thread-safe table of open handles.
//!
//! The passthrough core hands out owned handles and keeps no table of its
//! own; the kernel, however, refers to open files by a 64-bit number. This
//! table owns each handle between `open` and `release` and maps the number
//! given to the kernel back to it.
//!
//! # Handle Lifecycle
//!
//! 1. **Insert**: store the handle, receive a fresh non-zero id
//! 2. **Get**: borrow the handle for reads and truncates
//! 3. **Remove**: take the handle back out on release and close it
//!
//! Clearing the table (on unmount) drops every remaining handle, which
//! closes its host descriptor.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::Ref;
use std::sync::atomic::{AtomicU64, Ordering};

/// Concurrent map from kernel handle numbers to owned handles.
///
/// Ids start at 1; 0 is never issued so it can stand for "no handle".
///
/// ```
/// use oxpass_mount::HandleTable;
///
/// let table: HandleTable<&str> = HandleTable::new();
/// let a = table.insert("a");
/// let b = table.insert("b");
/// assert_ne!(a, b);
///
/// assert_eq!(table.remove(a), Some("a"));
/// assert_eq!(table.len(), 1);
/// ```
#[derive(Debug)]
pub struct HandleTable<V> {
    handles: DashMap<u64, V>,
    next_id: AtomicU64,
}

impl<V> HandleTable<V> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Stores `value` under a fresh id and returns the id.
    ///
    /// The counter wraps past `u64::MAX`, skipping 0 and any id still in use.
    pub fn insert(&self, value: V) -> u64 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id == 0 {
                continue;
            }
            if let Entry::Vacant(slot) = self.handles.entry(id) {
                slot.insert(value);
                return id;
            }
        }
    }

    /// Borrows the handle stored under `id`.
    pub fn get(&self, id: u64) -> Option<Ref<'_, u64, V>> {
        self.handles.get(&id)
    }

    /// Removes and returns the handle stored under `id`.
    pub fn remove(&self, id: u64) -> Option<V> {
        self.handles.remove(&id).map(|(_, v)| v)
    }

    /// Returns true if `id` is in use.
    pub fn contains(&self, id: u64) -> bool {
        self.handles.contains_key(&id)
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no handle is open.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Drops every handle. The id counter keeps counting.
    pub fn clear(&self) {
        self.handles.clear();
    }
}

impl<V> Default for HandleTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_ids_start_at_one() {
        let table = HandleTable::new();
        assert_eq!(table.insert("a"), 1);
        assert_eq!(table.insert("b"), 2);
        assert_eq!(table.insert("c"), 3);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_get_and_remove() {
        let table = HandleTable::new();
        let id = table.insert(String::from("hello"));

        assert_eq!(*table.get(id).expect("should exist"), "hello");
        assert!(table.contains(id));

        assert_eq!(table.remove(id), Some("hello".to_string()));
        assert!(!table.contains(id));
        assert!(table.get(id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_unknown_id() {
        let table: HandleTable<u8> = HandleTable::new();
        assert!(table.remove(999).is_none());
        assert!(table.remove(0).is_none());
    }

    #[test]
    fn test_wraparound_skips_zero_and_live_ids() {
        let table = HandleTable::new();
        let first = table.insert("first");
        table.next_id.store(u64::MAX, Ordering::Relaxed);

        assert_eq!(table.insert("max"), u64::MAX);
        let after = table.insert("after");
        assert_ne!(after, 0);
        assert_ne!(after, first);
        assert_eq!(*table.get(first).unwrap(), "first");
    }

    #[test]
    fn test_clear_drops_values_and_keeps_counting() {
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        let table = HandleTable::new();
        table.insert(Tracked(Arc::clone(&dropped)));
        table.insert(Tracked(Arc::clone(&dropped)));

        table.clear();
        assert_eq!(dropped.load(Ordering::SeqCst), 2);
        assert!(table.is_empty());
        assert_eq!(table.insert(Tracked(Arc::clone(&dropped))), 3);
    }

    #[test]
    fn test_concurrent_insert_yields_unique_ids() {
        let table = Arc::new(HandleTable::new());
        let mut workers = vec![];

        for t in 0..8 {
            let table = Arc::clone(&table);
            workers.push(thread::spawn(move || {
                (0..100).map(|i| table.insert(t * 100 + i)).collect::<Vec<_>>()
            }));
        }

        let mut ids: Vec<u64> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 800);
        assert_eq!(table.len(), 800);
    }

    #[test]
    fn test_concurrent_insert_and_remove() {
        let table = Arc::new(HandleTable::new());

        thread::scope(|s| {
            for t in 0..4 {
                let table = &table;
                s.spawn(move || {
                    for i in 0..200 {
                        let id = table.insert(t * 1000 + i);
                        assert_eq!(table.remove(id), Some(t * 1000 + i));
                    }
                });
            }
        });

        assert!(table.is_empty());
    }
}
