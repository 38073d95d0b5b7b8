//! Runtime context
//!
//! Wires configuration to the catalog, caches and repack manager. The bundle index and
//! the manager are created on first use.

use crate::bundles::{BundleCatalog, BundleIndex, DirectoryCatalog};
use crate::cache::{CacheStore, VersionPolicy};
use crate::config::{RepackConfig, ResolvedPaths};
use crate::container::ContainerHandle;
use crate::deps::AssetDependencies;
use crate::error::ApiError;
use crate::hierarchy::HierarchyIndex;
use crate::repack::{ContainerWriter, JsonPlanWriter, RepackManager};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::debug;

pub struct RepackContext {
    config: RepackConfig,
    paths: ResolvedPaths,
    policy: VersionPolicy,
    store: CacheStore,
    catalog: Arc<dyn BundleCatalog>,
    writer: Arc<dyn ContainerWriter>,
    index: OnceCell<BundleIndex>,
    manager: OnceCell<RepackManager>,
}

impl RepackContext {
    /// Directory catalog over `paths.bundle_dir` and the JSON plan writer.
    pub fn new(config: RepackConfig) -> Result<Self, ApiError> {
        let paths = config.resolved_paths()?;
        let catalog: Arc<dyn BundleCatalog> = Arc::new(DirectoryCatalog::new(&paths.bundle_dir));
        Self::with_parts(config, catalog, Arc::new(JsonPlanWriter))
    }

    pub fn with_parts(
        config: RepackConfig,
        catalog: Arc<dyn BundleCatalog>,
        writer: Arc<dyn ContainerWriter>,
    ) -> Result<Self, ApiError> {
        let paths = config.resolved_paths()?;
        let policy = config.version_policy()?;
        let store = CacheStore::new(&paths.cache_dir, policy.clone());
        debug!(
            cache_dir = %paths.cache_dir.display(),
            output_dir = %paths.output_dir.display(),
            content_version = %policy.content_version,
            "repack context ready"
        );
        Ok(Self {
            config,
            paths,
            policy,
            store,
            catalog,
            writer,
            index: OnceCell::new(),
            manager: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &RepackConfig {
        &self.config
    }

    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    pub fn policy(&self) -> &VersionPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &Arc<dyn BundleCatalog> {
        &self.catalog
    }

    pub fn bundle_index(&self) -> Result<&BundleIndex, ApiError> {
        self.index
            .get_or_try_init(|| BundleIndex::open(&self.store, Arc::clone(&self.catalog)))
    }

    pub fn repack_manager(&self) -> Result<&RepackManager, ApiError> {
        self.manager.get_or_try_init(|| {
            RepackManager::open(
                Arc::clone(&self.catalog),
                Arc::clone(&self.writer),
                self.policy.clone(),
                self.config.scan_config(),
                &self.paths.output_dir,
            )
        })
    }

    pub fn open_container(&self, bundle: &str) -> Result<Arc<ContainerHandle>, ApiError> {
        Ok(Arc::new(self.catalog.open(bundle)?))
    }

    pub fn dependencies(&self, bundle: &str) -> Result<AssetDependencies, ApiError> {
        let container = self.open_container(bundle)?;
        Ok(AssetDependencies::new(container, self.config.scan_config()))
    }

    pub fn hierarchy(&self, bundle: &str) -> Result<HierarchyIndex, ApiError> {
        let container = self.open_container(bundle)?;
        HierarchyIndex::build(&container)
    }

    /// Write every dirty cache that has been opened.
    pub fn flush(&self) -> Result<(), ApiError> {
        if let Some(index) = self.index.get() {
            index.flush()?;
        }
        if let Some(manager) = self.manager.get() {
            manager.flush()?;
        }
        Ok(())
    }
}
