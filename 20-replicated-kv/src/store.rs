//! In-memory key-value storage for a single node.
//!
//! Every node owns exactly one `LocalStore`. Mutations arrive from clients and
//! from peers replaying their own writes; both end up here.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe key-value map guarded by one exclusive lock.
///
/// The lock is held only for a single map access or copy and never across an
/// `.await`. Callers that need to iterate should take a [`snapshot`] and
/// iterate the copy.
///
/// # Why Mutex instead of RwLock?
///
/// Reads and writes are both single map operations, so readers would hold the
/// lock for about as long as writers. A plain `Mutex` keeps the locking rule
/// trivial to audit.
///
/// [`snapshot`]: LocalStore::snapshot
#[derive(Debug, Default)]
pub struct LocalStore {
    data: Mutex<HashMap<String, String>>,
}

impl LocalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Stores a key-value pair, overwriting any existing value.
    pub fn set(&self, key: String, value: String) {
        self.lock().insert(key, value);
    }

    /// Removes a key, returning the value it held.
    ///
    /// Removing a missing key is a no-op.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.lock().remove(key)
    }

    /// Retrieves the current value for a key.
    ///
    /// Returns `None` if the key doesn't exist. Whatever this node has applied
    /// is returned; there is no coordination with peers.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Returns a copy of all key-value pairs, taken under the lock.
    ///
    /// A write either happened entirely before the copy or entirely after it.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.lock().clone()
    }

    /// Inserts every entry whose key is absent and returns how many were inserted.
    ///
    /// Present keys keep their local value even when the incoming one differs.
    pub fn merge_missing<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut data = self.lock();
        let mut inserted = 0;
        for (key, value) in entries {
            if !data.contains_key(&key) {
                data.insert(key, value);
                inserted += 1;
            }
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the guard cannot leave the map half-updated: every
    // critical section is a single map call.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
