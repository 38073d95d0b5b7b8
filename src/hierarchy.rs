//! Hierarchical name resolution.
//!
//! Full hierarchy paths for every transform in a container, composed from the parent chain the
//! same way the engine composes them at runtime. Built once per container, read-only afterwards.

use crate::container::{ContainerHandle, ContainerReader, FIELD_FATHER, FIELD_GAME_OBJECT, FIELD_NAME};
use crate::error::ApiError;
use crate::objpath::SEPARATOR;
use crate::types::NodeId;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One resolved game object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    pub object_id: NodeId,
    pub transform_id: NodeId,
    pub path: String,
}

/// Structural links of one transform
struct TransformLinks {
    game_object: NodeId,
    parent: Option<NodeId>,
}

/// Path index over one container's hierarchy
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    nodes: Vec<HierarchyNode>,
    by_path: HashMap<String, usize>,
    by_object: HashMap<NodeId, usize>,
    by_transform: HashMap<NodeId, usize>,
}

impl HierarchyIndex {
    /// Resolve every transform of the container.
    ///
    /// Fails with `StructuralCycle` if a transform is its own ancestor and with
    /// `DanglingReference` if a parent or owner link names a missing object.
    pub fn build(container: &ContainerHandle) -> Result<Self, ApiError> {
        let mut reader = container.lock();
        let reader = reader.as_mut();

        let links = read_links(reader, container.name())?;
        let mut names: HashMap<NodeId, String> = HashMap::with_capacity(links.len());
        let mut paths: HashMap<NodeId, String> = HashMap::with_capacity(links.len());

        let mut transform_ids: Vec<NodeId> = links.keys().copied().collect();
        transform_ids.sort_unstable();

        for &start in &transform_ids {
            if paths.contains_key(&start) {
                continue;
            }

            // Ascend until a resolved transform or a root, then compose on the way down.
            let mut chain: Vec<NodeId> = Vec::new();
            let mut on_chain: HashSet<NodeId> = HashSet::new();
            let mut current = Some(start);
            let mut base: Option<String> = None;
            while let Some(id) = current {
                if let Some(resolved) = paths.get(&id) {
                    base = Some(resolved.clone());
                    break;
                }
                if !on_chain.insert(id) {
                    return Err(ApiError::StructuralCycle(id));
                }
                chain.push(id);
                let link = links.get(&id).ok_or(ApiError::DanglingReference(id))?;
                current = link.parent;
            }

            while let Some(id) = chain.pop() {
                let link = links.get(&id).ok_or(ApiError::DanglingReference(id))?;
                let leaf = game_object_name(reader, &mut names, link.game_object)?;
                let path = match &base {
                    Some(parent) => format!("{}{}{}", parent, SEPARATOR, leaf),
                    None => leaf,
                };
                paths.insert(id, path.clone());
                base = Some(path);
            }
        }

        let nodes = transform_ids
            .into_iter()
            .filter_map(|id| {
                let link = links.get(&id)?;
                let path = paths.remove(&id)?;
                Some(HierarchyNode {
                    object_id: link.game_object,
                    transform_id: id,
                    path,
                })
            })
            .collect::<Vec<_>>();

        debug!(
            container = container.name(),
            nodes = nodes.len(),
            "hierarchy resolved"
        );
        Ok(Self::from_nodes(nodes))
    }

    /// Index prebuilt nodes. With duplicate paths the last node wins the path lookup.
    pub fn from_nodes(mut nodes: Vec<HierarchyNode>) -> Self {
        nodes.sort_by(|a, b| a.path.cmp(&b.path).then(a.transform_id.cmp(&b.transform_id)));

        let mut by_path = HashMap::with_capacity(nodes.len());
        let mut by_object = HashMap::with_capacity(nodes.len());
        let mut by_transform = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            by_path.insert(node.path.clone(), idx);
            by_object.insert(node.object_id, idx);
            by_transform.insert(node.transform_id, idx);
        }

        Self {
            nodes,
            by_path,
            by_object,
            by_transform,
        }
    }

    pub fn by_path(&self, path: &str) -> Result<&HierarchyNode, ApiError> {
        self.by_path
            .get(path)
            .map(|&idx| &self.nodes[idx])
            .ok_or_else(|| ApiError::PathNotFound(path.to_string()))
    }

    pub fn by_object_id(&self, id: NodeId) -> Result<&HierarchyNode, ApiError> {
        self.by_object
            .get(&id)
            .map(|&idx| &self.nodes[idx])
            .ok_or(ApiError::GameObjectNotFound(id))
    }

    pub fn by_transform_id(&self, id: NodeId) -> Result<&HierarchyNode, ApiError> {
        self.by_transform
            .get(&id)
            .map(|&idx| &self.nodes[idx])
            .ok_or(ApiError::TransformNotFound(id))
    }

    /// All nodes, sorted by path
    pub fn iter(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn read_links(
    reader: &mut dyn ContainerReader,
    container: &str,
) -> Result<HashMap<NodeId, TransformLinks>, ApiError> {
    let mut links = HashMap::new();
    for id in reader.transform_ids() {
        let record = reader.read_record(id)?;
        let owner = record.reference(FIELD_GAME_OBJECT)?;
        if owner.is_null() || !owner.is_internal() {
            warn!(container, transform = id, "transform without a local game object");
            continue;
        }
        let father = record.reference(FIELD_FATHER)?;
        let parent = if father.is_null() {
            None
        } else if !father.is_internal() {
            warn!(
                container,
                transform = id,
                file_index = father.file_index,
                "parent lives in another container, treating as root"
            );
            None
        } else {
            Some(father.node_id)
        };
        links.insert(
            id,
            TransformLinks {
                game_object: owner.node_id,
                parent,
            },
        );
    }
    Ok(links)
}

fn game_object_name(
    reader: &mut dyn ContainerReader,
    names: &mut HashMap<NodeId, String>,
    id: NodeId,
) -> Result<String, ApiError> {
    if let Some(name) = names.get(&id) {
        return Ok(name.clone());
    }
    let record = reader.read_record(id).map_err(|err| match err {
        crate::error::ContainerError::NodeNotFound(missing) => ApiError::DanglingReference(missing),
        other => other.into(),
    })?;
    let name = record.string(FIELD_NAME)?.to_string();
    names.insert(id, name.clone());
    Ok(name)
}
