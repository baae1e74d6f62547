//! Handle-keyed session registry.
//!
//! Handles come from one atomic counter starting at 1 and are never reused,
//! whatever kind of session they name.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::session::Session;

/// Opaque session identifier handed across the boundary.
pub type Handle = u64;

/// Concurrent map from handle to a shared entry.
///
/// Lookups clone the `Arc`, so no shard lock is held while the caller does
/// I/O on the entry.
pub struct Registry<T> {
    entries: DashMap<Handle, Arc<T>>,
    next_handle: AtomicU64,
}

pub type SessionRegistry = Registry<Session>;

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Store `entry` under a fresh handle.
    pub fn allocate(&self, entry: T) -> Handle {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(handle, Arc::new(entry));
        handle
    }

    pub fn lookup(&self, handle: Handle) -> Option<Arc<T>> {
        self.entries.get(&handle).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, handle: Handle) -> Option<Arc<T>> {
        self.entries.remove(&handle).map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live handles in ascending order.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.entries.iter().map(|e| *e.key()).collect();
        handles.sort_unstable();
        handles
    }

    /// Remove and return every entry, in handle order.
    pub fn drain(&self) -> Vec<(Handle, Arc<T>)> {
        self.handles()
            .into_iter()
            .filter_map(|handle| self.remove(handle).map(|entry| (handle, entry)))
            .collect()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
