//! Reference field scanner: the outgoing references of a single object.

use super::ChildRefs;
use crate::container::{ContainerReader, FIELD_CHILDREN, FIELD_GAME_OBJECT};
use crate::error::{ApiError, ContainerError};
use crate::types::NodeId;
use serde::{Deserialize, Serialize};

/// Scanner settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Treat a transform's parent as a dependency. Pulls in the whole ancestor chain.
    #[serde(default)]
    pub follow_transform_parent: bool,
}

/// Finds the typed-reference fields of an object
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceScanner {
    config: ScanConfig,
}

impl ReferenceScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ScanConfig {
        self.config
    }

    /// Outgoing references of `id`. Fails with `NodeNotFound` if the object does not exist.
    pub fn scan(&self, reader: &mut dyn ContainerReader, id: NodeId) -> Result<ChildRefs, ApiError> {
        let class_id = reader.class_id(id)?;

        if !self.config.follow_transform_parent && class_id.is_transform() {
            return Self::scan_transform(reader, id);
        }

        let mut refs = ChildRefs::new();
        for record in reader.fields(id)? {
            let record = record?;
            if !record.is_reference() {
                continue;
            }
            let target = record.value.as_ref_value().ok_or_else(|| {
                ContainerError::UnexpectedType {
                    node: id,
                    field: record.name.to_string(),
                    expected: "reference",
                }
            })?;
            refs.add(target);
        }
        Ok(refs)
    }

    /// Owner plus direct children only; the parent link is skipped.
    fn scan_transform(reader: &mut dyn ContainerReader, id: NodeId) -> Result<ChildRefs, ApiError> {
        let record = reader.read_record(id)?;
        let mut refs = ChildRefs::new();
        refs.add(record.reference(FIELD_GAME_OBJECT)?);
        for child in record.references(FIELD_CHILDREN)? {
            refs.add(child);
        }
        Ok(refs)
    }
}
