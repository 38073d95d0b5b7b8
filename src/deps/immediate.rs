//! Memoized direct references per object.

use super::{ChildRefs, ReferenceScanner};
use crate::container::{ContainerHandle, ContainerReader};
use crate::error::ApiError;
use crate::types::NodeId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Direct-reference memo for one container. Entries are never evicted.
pub struct ImmediateDeps {
    scanner: ReferenceScanner,
    entries: RwLock<HashMap<NodeId, Arc<ChildRefs>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImmediateDeps {
    pub fn new(scanner: ReferenceScanner) -> Self {
        Self {
            scanner,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn scanner(&self) -> &ReferenceScanner {
        &self.scanner
    }

    /// Direct references of `id`, entering the container's critical section on a miss.
    pub fn get(&self, container: &ContainerHandle, id: NodeId) -> Result<Arc<ChildRefs>, ApiError> {
        if let Some(found) = self.cached(id) {
            return Ok(found);
        }
        let mut reader = container.lock();
        self.get_with_reader(reader.as_mut(), id)
    }

    /// Same as [`get`](Self::get) for a caller already holding the reader.
    pub fn get_with_reader(
        &self,
        reader: &mut dyn ContainerReader,
        id: NodeId,
    ) -> Result<Arc<ChildRefs>, ApiError> {
        if let Some(found) = self.cached(id) {
            return Ok(found);
        }

        let refs = Arc::new(self.scanner.scan(reader, id)?);

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(existing.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        entries.insert(id, refs.clone());
        Ok(refs)
    }

    fn cached(&self, id: NodeId) -> Option<Arc<ChildRefs>> {
        let found = self.entries.read().get(&id).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// (hits, misses)
    pub fn counters(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
