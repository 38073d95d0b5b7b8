//! Core types for container dependency resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// NodeId: identifier of an object within one container (the container's path id)
pub type NodeId = i64;

/// FileIndex: index into a container's external-file table, 0 meaning the container itself
pub type FileIndex = i32;

/// Null target of a reference field
pub const NULL_NODE: NodeId = 0;

/// File index naming the current container
pub const SELF_FILE: FileIndex = 0;

/// Decoded value of a typed reference field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawRef {
    pub file_index: FileIndex,
    pub node_id: NodeId,
}

impl RawRef {
    pub fn new(file_index: FileIndex, node_id: NodeId) -> Self {
        Self {
            file_index,
            node_id,
        }
    }

    /// Reference to an object in the current container
    pub fn internal(node_id: NodeId) -> Self {
        Self::new(SELF_FILE, node_id)
    }

    pub fn null() -> Self {
        Self::new(SELF_FILE, NULL_NODE)
    }

    pub fn is_null(&self) -> bool {
        self.node_id == NULL_NODE
    }

    pub fn is_internal(&self) -> bool {
        self.file_index == SELF_FILE
    }
}

/// Reference to an object in a different container.
///
/// Never followed by the in-container resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalRef {
    pub file_index: FileIndex,
    pub node_id: NodeId,
}

impl ExternalRef {
    pub fn new(file_index: FileIndex, node_id: NodeId) -> Self {
        Self {
            file_index,
            node_id,
        }
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_index, self.node_id)
    }
}

impl From<ExternalRef> for RawRef {
    fn from(r: ExternalRef) -> Self {
        RawRef::new(r.file_index, r.node_id)
    }
}
