//! Transitive closure of references within a single container.

use super::{ChildRefs, ImmediateDeps};
use crate::container::ContainerHandle;
use crate::error::ApiError;
use crate::types::NodeId;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Closure memo keyed by root object
#[derive(Default)]
pub struct TransitiveDeps {
    entries: RwLock<HashMap<NodeId, Arc<ChildRefs>>>,
}

impl TransitiveDeps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every object reachable from `root` through internal references, excluding `root`
    /// itself, plus the union of the external references met on the way.
    ///
    /// The whole traversal runs inside one critical section of the container.
    pub fn get(
        &self,
        container: &ContainerHandle,
        immediate: &ImmediateDeps,
        root: NodeId,
    ) -> Result<Arc<ChildRefs>, ApiError> {
        if let Some(found) = self.entries.read().get(&root).cloned() {
            return Ok(found);
        }

        let mut reader = container.lock();
        let reader = reader.as_mut();

        let root_refs = immediate.get_with_reader(reader, root)?;

        let mut result = ChildRefs::new();
        result.external.extend(root_refs.external.iter().copied());

        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(root);
        let mut queue: VecDeque<NodeId> = root_refs.internal.iter().copied().collect();

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            let refs = immediate
                .get_with_reader(reader, node)
                .map_err(|err| match err {
                    ApiError::NodeNotFound(missing) => {
                        warn!(
                            container = container.name(),
                            root, missing, "dangling internal reference"
                        );
                        ApiError::DanglingReference(missing)
                    }
                    other => other,
                })?;
            result.internal.insert(node);
            result.external.extend(refs.external.iter().copied());
            queue.extend(refs.internal.iter().filter(|id| !visited.contains(id)));
        }

        debug!(
            container = container.name(),
            root,
            internal = result.internal.len(),
            external = result.external.len(),
            "closure computed"
        );

        let result = Arc::new(result);
        let mut entries = self.entries.write();
        Ok(entries.entry(root).or_insert(result).clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
