//! Write plan handed to the byte-level container writer.

use crate::error::{ApiError, StorageError};
use crate::types::{ExternalRef, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// One loadable entry of the generated container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub entry_name: String,
    pub anchor_path: String,
    pub game_object_id: NodeId,
    pub transform_id: NodeId,
    /// The anchor's parent is not copied; the writer must detach the anchor.
    pub deparent: bool,
}

/// Everything the writer needs to produce the minimized container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepackPlan {
    pub source: String,
    pub cab_name: String,
    pub bundle_name: String,
    pub output_path: PathBuf,
    pub entries: Vec<PlanEntry>,
    /// Objects to copy from the source container
    pub object_ids: BTreeSet<NodeId>,
    pub external_dependencies: BTreeSet<ExternalRef>,
}

/// Byte-level container writer
pub trait ContainerWriter: Send + Sync {
    fn write(&self, plan: &RepackPlan) -> Result<(), ApiError>;
}

/// Persists plans as JSON next to the intended output path, for an external writer to pick up.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPlanWriter;

impl JsonPlanWriter {
    /// `<output_path>.plan.json`
    pub fn plan_path(output_path: &Path) -> PathBuf {
        let mut path = output_path.as_os_str().to_os_string();
        path.push(".plan.json");
        PathBuf::from(path)
    }
}

impl ContainerWriter for JsonPlanWriter {
    fn write(&self, plan: &RepackPlan) -> Result<(), ApiError> {
        let target = Self::plan_path(&plan.output_path);
        let json = serde_json::to_vec_pretty(plan)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(StorageError::from)?;
        }
        let mut tmp = target.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(StorageError::from)?;
        fs::rename(&tmp, &target).map_err(StorageError::from)?;

        info!(
            plan = %target.display(),
            entries = plan.entries.len(),
            objects = plan.object_ids.len(),
            "repack plan written"
        );
        Ok(())
    }
}
