//! Batching of TTL refresh requests
//!
//! Read-only requests end with "refresh the TTL of session X". Rather than
//! hitting the backend for each one, stores enroll the id here and a single
//! background task drains the collection on a fixed interval, so an id touched
//! a thousand times between drains costs one backend call.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Default upper bound on pending entries
pub const DEFAULT_CAPACITY: usize = 1 << 20;

/// Lock-guarded id collection where each id appears at most once.
///
/// `V` is the payload kept per id: `()` for a plain set, or the latest TTL in
/// seconds for stores that need it at flush time. Re-adding an id replaces its
/// payload, so the latest value wins.
pub struct Coalescer<V> {
    entries: Mutex<HashMap<String, V>>,
    capacity: usize,
}

/// Set of ids (file store)
pub type IdSet = Coalescer<()>;

/// Map of id to latest TTL in seconds (kv blob store)
pub type TtlMap = Coalescer<u64>;

impl<V> Coalescer<V> {
    /// Create an empty coalescer with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty coalescer holding at most `capacity` ids
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Enroll `id`, replacing any pending payload.
    ///
    /// Returns `false` when the id is new but the coalescer is full; the
    /// request is dropped in that case.
    pub fn add(&self, id: &str, value: V) -> bool {
        let mut entries = self.entries.lock();
        if let Some(slot) = entries.get_mut(id) {
            *slot = value;
            return true;
        }
        if entries.len() >= self.capacity {
            tracing::warn!(session_id = %id, capacity = self.capacity, "TTL refresh queue full, dropping request");
            return false;
        }
        entries.insert(id.to_string(), value);
        true
    }

    /// Enroll `id` only if it is not already pending. Returns whether it was added.
    pub fn add_if_absent(&self, id: &str, value: V) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(id) || entries.len() >= self.capacity {
            return false;
        }
        entries.insert(id.to_string(), value);
        true
    }

    /// Remove and return an arbitrary pending entry
    pub fn pop_one(&self) -> Option<(String, V)> {
        let mut entries = self.entries.lock();
        let key = entries.keys().next().cloned()?;
        entries.remove_entry(&key)
    }

    /// Remove and return every pending entry
    pub fn drain(&self) -> Vec<(String, V)> {
        self.entries.lock().drain().collect()
    }

    /// Drop a pending entry, e.g. when the session was rewritten or deleted
    pub fn remove(&self, id: &str) -> Option<V> {
        self.entries.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<V> Default for Coalescer<V> {
    fn default() -> Self {
        Self::new()
    }
}
