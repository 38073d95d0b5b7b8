//! Stripped repacking: keep only the rootmost objects needed to load every requested path.
//! Anchors whose parent is not part of the copied set are detached.

use super::writer::{ContainerWriter, PlanEntry, RepackPlan};
use super::{repacked_bundle_name, repacked_cab_name, unique_entry_name, RepackedBundleData, STRIPPED_STRATEGY};
use crate::bundles::{BundleIndex, BUNDLE_EXTENSION};
use crate::cache::VersionPolicy;
use crate::container::ContainerHandle;
use crate::deps::{AssetDependencies, ScanConfig};
use crate::error::ApiError;
use crate::hierarchy::HierarchyIndex;
use crate::objpath::{find_ancestor, highest_nodes, parent_of};
use crate::types::NodeId;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One-shot repack pipeline over a single open container
pub struct StrippedRepacker<'a> {
    writer: &'a dyn ContainerWriter,
    policy: &'a VersionPolicy,
    scan: ScanConfig,
    index: Option<&'a BundleIndex>,
}

impl<'a> StrippedRepacker<'a> {
    pub fn new(writer: &'a dyn ContainerWriter, policy: &'a VersionPolicy, scan: ScanConfig) -> Self {
        Self {
            writer,
            policy,
            scan,
            index: None,
        }
    }

    /// Resolve external references to bundle names through `index`.
    pub fn with_index(mut self, index: &'a BundleIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Repack `requested` out of `container`.
    ///
    /// Paths that cannot be resolved end up in `non_repacked_assets`. Only container corruption,
    /// structural cycles, storage failures and a container without any hierarchy fail the call.
    pub fn repack(
        &self,
        source: &str,
        container: Arc<ContainerHandle>,
        requested: &[String],
        output_dir: &Path,
    ) -> Result<RepackedBundleData, ApiError> {
        let reduced = highest_nodes(requested);
        info!(
            source,
            requested = requested.len(),
            reduced = reduced.len(),
            "repack started"
        );

        let hierarchy = HierarchyIndex::build(&container)?;
        if hierarchy.is_empty() {
            return Err(ApiError::Unsupported(format!(
                "container {} has no hierarchy objects",
                container.name()
            )));
        }
        let deps = AssetDependencies::new(container.clone(), self.scan);

        // Roots of the request and everything they pull in
        let mut failed: Vec<String> = Vec::new();
        let mut combined: BTreeSet<NodeId> = BTreeSet::new();
        for path in &reduced {
            let node = match hierarchy.by_path(path) {
                Ok(node) => node,
                Err(e) => {
                    warn!(source, path = %path, error = %e, "requested path not found");
                    failed.push(path.clone());
                    continue;
                }
            };
            match deps.closure(node.object_id) {
                Ok(closure) => {
                    combined.insert(node.object_id);
                    combined.extend(closure.internal.iter().copied());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(source, path = %path, error = %e, "could not resolve dependencies");
                    failed.push(path.clone());
                }
            }
        }

        // Rootmost game objects among everything included
        let included_paths = combined
            .iter()
            .filter_map(|id| hierarchy.by_object_id(*id).ok())
            .map(|node| node.path.as_str());
        let rootmost = highest_nodes(included_paths);
        debug!(source, included = combined.len(), rootmost = rootmost.len(), "rootmost set computed");

        // Which anchor serves each requested path
        let mut requested_sorted: Vec<&String> = requested.iter().collect();
        requested_sorted.sort();
        requested_sorted.dedup();

        let mut not_satisfied: BTreeSet<String> = BTreeSet::new();
        let mut anchors: BTreeSet<String> = BTreeSet::new();
        for path in requested_sorted {
            if find_ancestor(&failed, path).is_some() || hierarchy.by_path(path).is_err() {
                not_satisfied.insert(path.clone());
                continue;
            }
            match find_ancestor(&rootmost, path) {
                Some(found) => {
                    anchors.insert(found.ancestor.to_string());
                }
                None => {
                    error!(source, path = %path, "resolved path has no ancestor in the rootmost set");
                    not_satisfied.insert(path.clone());
                }
            }
        }

        // Copied objects: each anchor and its closure
        let mut object_ids: BTreeSet<NodeId> = BTreeSet::new();
        let mut external_dependencies = BTreeSet::new();
        for anchor in &anchors {
            let node = hierarchy.by_path(anchor)?;
            let closure = deps.closure(node.object_id)?;
            object_ids.insert(node.object_id);
            object_ids.insert(node.transform_id);
            object_ids.extend(closure.internal.iter().copied());
            external_dependencies.extend(closure.external.iter().copied());
        }

        let mut entries = Vec::with_capacity(anchors.len());
        let mut game_object_assets = BTreeMap::new();
        for anchor in &anchors {
            let node = hierarchy.by_path(anchor)?;
            let deparent = match parent_of(anchor).map(|parent| hierarchy.by_path(parent)) {
                Some(Ok(parent)) => !object_ids.contains(&parent.transform_id),
                Some(Err(_)) | None => false,
            };
            let entry = unique_entry_name(source, anchor, node.transform_id, &game_object_assets);
            game_object_assets.insert(entry.clone(), anchor.clone());
            entries.push(PlanEntry {
                entry_name: entry,
                anchor_path: anchor.clone(),
                game_object_id: node.object_id,
                transform_id: node.transform_id,
                deparent,
            });
        }

        let dependency_bundles = match self.index {
            Some(index) => {
                let own = crate::bundles::bundle_file_name(source);
                external_dependencies
                    .iter()
                    .filter_map(|ext| index.resolve_external(&container, *ext))
                    .filter(|bundle| *bundle != own)
                    .collect()
            }
            None => BTreeSet::new(),
        };

        let cab_name = repacked_cab_name(source, &reduced);
        let bundle_name = repacked_bundle_name(source);
        let plan = RepackPlan {
            source: source.to_string(),
            cab_name: cab_name.clone(),
            bundle_name: bundle_name.clone(),
            output_path: output_dir.join(format!("{}{}", bundle_name, BUNDLE_EXTENSION)),
            entries,
            object_ids,
            external_dependencies: external_dependencies.clone(),
        };
        if !plan.entries.is_empty() {
            self.writer.write(&plan)?;
        }

        let stats = deps.stats();
        info!(
            source,
            entries = game_object_assets.len(),
            objects = plan.object_ids.len(),
            not_satisfied = not_satisfied.len(),
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            "repack finished"
        );

        let stamp = self.policy.stamp();
        Ok(RepackedBundleData {
            repack_strategy: Some(STRIPPED_STRATEGY.to_string()),
            content_version: Some(stamp.content_version),
            tool_version: Some(stamp.tool_version),
            bundle_name: Some(bundle_name),
            cab_name: Some(cab_name),
            game_object_assets,
            non_repacked_assets: not_satisfied.into_iter().collect(),
            external_dependencies,
            dependency_bundles,
        })
    }
}
