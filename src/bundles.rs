//! Cross-Container Dependency Index
//!
//! Maps short content tags ("cab" names) to the bundles that own them and derives
//! bundle-to-bundle dependencies from each container's external-file table. Both maps are
//! persisted through the version-gated cache (`cabs.json`, `direct_deps.json`).

use crate::cache::{CacheStore, CachedObject};
use crate::container::{ContainerHandle, MemoryContainer};
use crate::error::{ApiError, StorageError};
use crate::types::ExternalRef;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const BUNDLE_EXTENSION: &str = ".bundle";
pub const CAB_LOOKUP_FILE: &str = "cabs.json";
pub const DIRECT_DEPS_FILE: &str = "direct_deps.json";

static BUNDLE_HASH_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_[0-9a-fA-F]{32}\.bundle$").expect("valid bundle suffix pattern"));

/// Short content tag of an external-table origin path: final segment, text before the first
/// `.`, lowercased. `archive:/CAB-1F2E/CAB-1F2E.resS` becomes `cab-1f2e`.
pub fn cab_name(origin_path: &str) -> String {
    let segment = origin_path.rsplit('/').next().unwrap_or(origin_path);
    let stem = segment.split('.').next().unwrap_or(segment);
    stem.to_lowercase()
}

/// Strip the versioned hash suffix, and with it the `.bundle` extension, from a catalog key.
///
/// `scenes_scenes_scenes/tut_01_1f2e3d4c5b6a79881f2e3d4c5b6a7988.bundle` becomes
/// `scenes_scenes_scenes/tut_01`. Keys without the suffix keep their extension, so
/// `scenes/tut_01.bundle` and `scenes/tut_01_<hash>.bundle` are different keys.
pub fn normalize_container_key(key: &str) -> String {
    BUNDLE_HASH_SUFFIX.replace(key, "").into_owned()
}

/// Append `.bundle` unless already present
pub fn bundle_file_name(bundle: &str) -> String {
    if bundle.ends_with(BUNDLE_EXTENSION) {
        bundle.to_string()
    } else {
        format!("{}{}", bundle, BUNDLE_EXTENSION)
    }
}

/// Source of containers keyed by bundle path
pub trait BundleCatalog: Send + Sync {
    /// Relative, `/`-separated keys of every bundle
    fn bundle_keys(&self) -> Result<Vec<String>, ApiError>;

    /// Open one bundle's container. Fails with `ContainerNotFound` for unknown keys and
    /// `Unsupported` for files that cannot be read as a container.
    fn open(&self, bundle_key: &str) -> Result<ContainerHandle, ApiError>;
}

/// Catalog over a directory of `.bundle` container dumps
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BundleCatalog for DirectoryCatalog {
    fn bundle_keys(&self) -> Result<Vec<String>, ApiError> {
        if !self.root.is_dir() {
            return Err(ApiError::ConfigError(format!(
                "Bundle directory does not exist: {}",
                self.root.display()
            )));
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| {
                ApiError::StorageError(StorageError::IoError(std::io::Error::other(e.to_string())))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("bundle") {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(&self.root) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn open(&self, bundle_key: &str) -> Result<ContainerHandle, ApiError> {
        let path = self.root.join(bundle_file_name(bundle_key));
        if !path.is_file() {
            return Err(ApiError::ContainerNotFound(bundle_key.to_string()));
        }
        let container = MemoryContainer::from_path(&path).map_err(|e| {
            ApiError::Unsupported(format!("cannot open bundle {}: {}", bundle_key, e))
        })?;
        Ok(ContainerHandle::new(container))
    }
}

/// Persisted cab and bundle dependency maps
pub struct BundleIndex {
    catalog: std::sync::Arc<dyn BundleCatalog>,
    cabs: CachedObject<BTreeMap<String, String>>,
    direct: CachedObject<BTreeMap<String, Vec<String>>>,
}

impl BundleIndex {
    /// Load both maps, walking the catalog if the cab map is missing or stale.
    pub fn open(store: &CacheStore, catalog: std::sync::Arc<dyn BundleCatalog>) -> Result<Self, ApiError> {
        let cabs = store.load_or_create(CAB_LOOKUP_FILE, || generate_cab_lookup(catalog.as_ref()))?;
        let direct = store.load_or_create(DIRECT_DEPS_FILE, || Ok(BTreeMap::new()))?;
        Ok(Self {
            catalog,
            cabs,
            direct,
        })
    }

    pub fn catalog(&self) -> &dyn BundleCatalog {
        self.catalog.as_ref()
    }

    /// cab name -> bundle key
    pub fn cab_lookup(&self) -> BTreeMap<String, String> {
        self.cabs.read().clone()
    }

    pub fn bundle_for_cab(&self, cab: &str) -> Option<String> {
        self.cabs.read().get(&cab.to_lowercase()).cloned()
    }

    /// Bundle owning the target of an external reference of `container`
    pub fn resolve_external(&self, container: &ContainerHandle, target: ExternalRef) -> Option<String> {
        let file = container.external_file(target.file_index)?;
        self.bundle_for_cab(&cab_name(&file.path))
    }

    /// Bundles referenced by the external-file table of `bundle`, memoized.
    pub fn direct_deps(&self, bundle: &str) -> Result<Vec<String>, ApiError> {
        let bundle_file = bundle_file_name(bundle);
        if let Some(deps) = self.direct.read().get(&bundle_file) {
            return Ok(deps.clone());
        }

        let container = self.catalog.open(&bundle_file)?;
        let mut deps: Vec<String> = Vec::new();
        for external in container.externals() {
            let cab = cab_name(&external.path);
            match self.bundle_for_cab(&cab) {
                Some(dep) if !deps.contains(&dep) => deps.push(dep),
                Some(_) => {}
                None => debug!(bundle = %bundle_file, cab = %cab, "external not in any bundle"),
            }
        }

        debug!(bundle = %bundle_file, deps = deps.len(), "direct dependencies computed");
        self.direct
            .update(|map| map.insert(bundle_file, deps.clone()));
        Ok(deps)
    }

    /// Every bundle reachable through direct dependencies, excluding `bundle` itself.
    pub fn transitive_deps(&self, bundle: &str) -> Result<BTreeSet<String>, ApiError> {
        let start = bundle_file_name(bundle);
        let mut seen: BTreeSet<String> = BTreeSet::new();
        seen.insert(start.clone());
        let mut queue = VecDeque::from([start.clone()]);

        while let Some(current) = queue.pop_front() {
            for dep in self.direct_deps(&current)? {
                if seen.insert(dep.clone()) {
                    queue.push_back(dep);
                }
            }
        }

        seen.remove(&start);
        Ok(seen)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.cabs.flush()?;
        self.direct.flush()
    }
}

fn generate_cab_lookup(catalog: &dyn BundleCatalog) -> Result<BTreeMap<String, String>, ApiError> {
    let mut lookup = BTreeMap::new();
    for key in catalog.bundle_keys()? {
        let container = match catalog.open(&key) {
            Ok(container) => container,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(bundle = %key, error = %e, "skipping unreadable bundle");
                continue;
            }
        };
        lookup.insert(cab_name(container.name()), key);
    }
    info!(bundles = lookup.len(), "cab lookup generated");
    Ok(lookup)
}
