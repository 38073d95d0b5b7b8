//! Repacking
//!
//! Turns a list of requested hierarchy paths into the minimal object set of a new container,
//! plus the record describing which generated entry serves which path.
//!
//! ```text
//! requested paths ──> highest_nodes ──> HierarchyIndex ──> closure per root
//!                                                              │
//!     RepackedBundleData <── entries <── rootmost anchors <────┘
//!             │
//!             └──> RepackPlan ──> ContainerWriter
//! ```

pub mod manager;
pub mod stripped;
pub mod writer;

use crate::bundles::normalize_container_key;
use crate::cache::VersionStamp;
use crate::objpath::{find_ancestor, relative_path};
use crate::types::{ExternalRef, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub use manager::{RepackManager, RepackOutcome, RepackReport, RepackStore, REPACK_DATA_FILE};
pub use stripped::StrippedRepacker;
pub use writer::{ContainerWriter, JsonPlanWriter, PlanEntry, RepackPlan};

pub const STRIPPED_STRATEGY: &str = "stripped";

/// Result of one repack of one container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepackedBundleData {
    /// How the repack was done
    pub repack_strategy: Option<String>,
    /// Host content version the bundle was produced against
    pub content_version: Option<String>,
    /// Version of this tool that produced the bundle
    pub tool_version: Option<String>,
    /// Internal name of the generated bundle
    pub bundle_name: Option<String>,
    /// Short content tag of the generated container
    pub cab_name: Option<String>,
    /// Generated entry name -> hierarchy path of the anchor object it holds
    #[serde(default)]
    pub game_object_assets: BTreeMap<String, String>,
    /// Requested paths that could not be repacked
    #[serde(default)]
    pub non_repacked_assets: Vec<String>,
    /// External references reached from the copied objects
    #[serde(default)]
    pub external_dependencies: BTreeSet<ExternalRef>,
    /// Bundles those external references live in
    #[serde(default)]
    pub dependency_bundles: BTreeSet<String>,
}

/// Where a hierarchy path can be loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTarget<'a> {
    pub entry: &'a str,
    /// Path below the entry's anchor; `None` when the anchor itself was asked for
    pub relative: Option<String>,
}

impl RepackedBundleData {
    /// Entry serving `path`, if any
    pub fn can_load(&self, path: &str) -> Option<LoadTarget<'_>> {
        self.game_object_assets.iter().find_map(|(entry, anchor)| {
            relative_path(anchor, path).map(|relative| LoadTarget {
                entry: entry.as_str(),
                relative,
            })
        })
    }

    /// True if a repack already attempted `path`, successfully or not.
    pub fn tried_to_repack(&self, path: &str) -> bool {
        find_ancestor(&self.non_repacked_assets, path).is_some() || self.can_load(path).is_some()
    }

    pub fn version_stamp(&self) -> Option<VersionStamp> {
        Some(VersionStamp {
            content_version: self.content_version.clone()?,
            tool_version: self.tool_version.clone()?,
        })
    }

    /// Every path this record was built to cover
    pub fn covered_paths(&self) -> impl Iterator<Item = &str> {
        self.game_object_assets
            .values()
            .chain(self.non_repacked_assets.iter())
            .map(String::as_str)
    }
}

/// Source key reduced to a name usable inside generated names: hash suffix and extension
/// stripped, separators flattened, lowercased.
pub fn source_stem(source: &str) -> String {
    let normalized = normalize_container_key(source);
    let trimmed = normalized
        .strip_suffix(crate::bundles::BUNDLE_EXTENSION)
        .unwrap_or(&normalized);
    trimmed.replace(['/', '\\'], "_").to_lowercase()
}

/// `CAB-` plus the first 32 hex digits of a digest over the source and the reduced requests.
pub fn repacked_cab_name(source: &str, reduced_requests: &[String]) -> String {
    let mut sorted: Vec<&str> = reduced_requests.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    for request in sorted {
        hasher.update(&[0]);
        hasher.update(request.as_bytes());
    }
    let digest = hex::encode(hasher.finalize().as_bytes());
    format!("CAB-{}", &digest[..32])
}

pub fn repacked_bundle_name(source: &str) -> String {
    format!("repacked_{}", source_stem(source))
}

pub fn entry_name(source: &str, anchor_path: &str) -> String {
    format!("assets/repacked/{}/{}.prefab", source_stem(source), anchor_path).to_lowercase()
}

/// `entry_name`, unless another anchor that differs only in case already holds it. Then the
/// anchor's transform id is appended, plus a counter if even that is taken.
pub fn unique_entry_name(
    source: &str,
    anchor_path: &str,
    transform_id: NodeId,
    taken: &BTreeMap<String, String>,
) -> String {
    let plain = entry_name(source, anchor_path);
    if !taken.contains_key(&plain) {
        return plain;
    }
    let stem = source_stem(source);
    let mut attempt = 0usize;
    loop {
        let suffix = match attempt {
            0 => transform_id.to_string(),
            n => format!("{}_{}", transform_id, n),
        };
        let candidate = format!("assets/repacked/{}/{}_{}.prefab", stem, anchor_path, suffix).to_lowercase();
        if !taken.contains_key(&candidate) {
            return candidate;
        }
        attempt += 1;
    }
}
