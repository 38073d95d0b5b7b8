//! Keyed locking for repack operations
//!
//! Repacks of the same container key are serialized; repacks of different keys run
//! independently.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Per-key lock manager
pub struct KeyedLockManager<K> {
    /// Map from key to its read-write lock
    locks: RwLock<HashMap<K, Arc<RwLock<()>>>>,
}

impl<K> KeyedLockManager<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the lock for `key`
    pub fn get_lock(&self, key: &K) -> Arc<RwLock<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(key) {
                return lock.clone();
            }
        }

        let mut map = self.locks.write();
        // Another thread may have inserted between the two guards
        map.entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }
}

impl<K> Default for KeyedLockManager<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
