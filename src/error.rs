//! Error types for container access, cache storage and the public API.

use crate::types::NodeId;
use thiserror::Error;

/// Errors raised by a container reader
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Object not found in container: {0}")]
    NodeNotFound(NodeId),

    #[error("Object {node} has no field '{field}'")]
    MissingField { node: NodeId, field: String },

    #[error("Field '{field}' of object {node} is not a {expected}")]
    UnexpectedType {
        node: NodeId,
        field: String,
        expected: &'static str,
    },

    #[error("Corrupt container data: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse container dump: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by persisted cache files
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Public API errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Hierarchy path not found: {0}")]
    PathNotFound(String),

    #[error("Game object not found: {0}")]
    GameObjectNotFound(NodeId),

    #[error("Transform not found: {0}")]
    TransformNotFound(NodeId),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Transform {0} is its own ancestor")]
    StructuralCycle(NodeId),

    #[error("Reference to missing object {0} met during traversal")]
    DanglingReference(NodeId),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Container error: {0}")]
    Container(ContainerError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl ApiError {
    /// A lookup failed; the requested thing does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApiError::NodeNotFound(_)
                | ApiError::PathNotFound(_)
                | ApiError::GameObjectNotFound(_)
                | ApiError::TransformNotFound(_)
                | ApiError::ContainerNotFound(_)
        )
    }

    /// Further results from the same container would be unverifiable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ApiError::StructuralCycle(_)
                | ApiError::DanglingReference(_)
                | ApiError::Container(_)
                | ApiError::StorageError(_)
        )
    }
}

impl From<ContainerError> for ApiError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::NodeNotFound(id) => ApiError::NodeNotFound(id),
            other => ApiError::Container(other),
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
