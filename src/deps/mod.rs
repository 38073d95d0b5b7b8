//! Object Dependencies
//!
//! Resolves what an object in an open container references, directly and transitively.
//!
//! ```text
//! closure(root)
//!     │
//!     ├──> TransitiveDeps   memo per root, BFS under one reader lock
//!     │
//!     ├──> ImmediateDeps    memo per object, hit/miss counters
//!     │
//!     └──> ReferenceScanner typed-reference fields, transform special case
//! ```

pub mod closure;
pub mod immediate;
pub mod scanner;

use crate::container::ContainerHandle;
use crate::error::ApiError;
use crate::types::{ExternalRef, NodeId, RawRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

pub use closure::TransitiveDeps;
pub use immediate::ImmediateDeps;
pub use scanner::{ReferenceScanner, ScanConfig};

/// Everything one object points to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRefs {
    /// Objects within the current container
    pub internal: BTreeSet<NodeId>,
    /// Objects in other containers
    pub external: BTreeSet<ExternalRef>,
}

impl ChildRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reference. Null targets are dropped.
    ///
    /// Returns true if the reference was not already present.
    pub fn add(&mut self, target: RawRef) -> bool {
        if target.is_null() {
            return false;
        }
        if target.is_internal() {
            self.internal.insert(target.node_id)
        } else {
            self.external
                .insert(ExternalRef::new(target.file_index, target.node_id))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty()
    }

    pub fn union_with(&mut self, other: &ChildRefs) {
        self.internal.extend(other.internal.iter().copied());
        self.external.extend(other.external.iter().copied());
    }
}

/// Cache counters for one container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DependencyStats {
    pub hits: u64,
    pub misses: u64,
    pub immediate_entries: usize,
    pub closure_entries: usize,
}

/// Dependency resolver scoped to one open container
pub struct AssetDependencies {
    container: Arc<ContainerHandle>,
    immediate: ImmediateDeps,
    transitive: TransitiveDeps,
}

impl AssetDependencies {
    pub fn new(container: Arc<ContainerHandle>, config: ScanConfig) -> Self {
        Self {
            container,
            immediate: ImmediateDeps::new(ReferenceScanner::new(config)),
            transitive: TransitiveDeps::new(),
        }
    }

    pub fn container(&self) -> &Arc<ContainerHandle> {
        &self.container
    }

    pub fn config(&self) -> ScanConfig {
        self.immediate.scanner().config()
    }

    /// Direct references of one object
    pub fn immediate(&self, id: NodeId) -> Result<Arc<ChildRefs>, ApiError> {
        self.immediate.get(&self.container, id)
    }

    /// Strict transitive dependencies of one object within this container
    pub fn closure(&self, id: NodeId) -> Result<Arc<ChildRefs>, ApiError> {
        self.transitive.get(&self.container, &self.immediate, id)
    }

    pub fn stats(&self) -> DependencyStats {
        let (hits, misses) = self.immediate.counters();
        DependencyStats {
            hits,
            misses,
            immediate_entries: self.immediate.len(),
            closure_entries: self.transitive.len(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::container::{ClassId, ContainerHandle, Field, MemoryContainer};
    use crate::types::RawRef;
    use std::sync::Arc;

    pub const MESH_FILTER: ClassId = ClassId(33);
    pub const MONO_BEHAVIOUR: ClassId = ClassId(114);

    /// Root(1,2) with children A(3,4) and B(5,6); A carries a script referencing an external
    /// asset and a sibling, B carries a mesh filter referencing a shared mesh (9).
    pub fn small_scene() -> Arc<ContainerHandle> {
        let mut c = MemoryContainer::new("CAB-small");
        c.add_external("archive:/CAB-shared/CAB-shared");
        c.insert_game_object(1, "Root", &[2])
            .insert_transform(2, 1, 0, &[4, 6])
            .insert_game_object(3, "A", &[4, 7])
            .insert_transform(4, 3, 2, &[])
            .insert_game_object(5, "B", &[6, 8])
            .insert_transform(6, 5, 2, &[])
            .insert_component(
                7,
                MONO_BEHAVIOUR,
                3,
                vec![
                    Field::reference("m_Script", "MonoScript", RawRef::new(1, 500)),
                    Field::reference("target", "GameObject", RawRef::internal(5)),
                    Field::reference("unset", "GameObject", RawRef::null()),
                ],
            )
            .insert_component(
                8,
                MESH_FILTER,
                5,
                vec![Field::reference("m_Mesh", "Mesh", RawRef::internal(9))],
            )
            .insert_object(crate::container::ObjectRecord {
                id: 9,
                class_id: ClassId(43),
                fields: vec![Field::new(
                    "m_Name",
                    "string",
                    crate::container::FieldValue::Str("shared mesh".to_string()),
                )],
            });
        Arc::new(ContainerHandle::new(c))
    }
}
