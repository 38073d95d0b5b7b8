//! Repack orchestration across many containers, with the persisted record store.

use super::stripped::StrippedRepacker;
use super::writer::ContainerWriter;
use super::RepackedBundleData;
use crate::bundles::{normalize_container_key, BundleCatalog, BundleIndex};
use crate::cache::{CachedObject, VersionPolicy};
use crate::concurrency::KeyedLockManager;
use crate::deps::ScanConfig;
use crate::error::{ApiError, StorageError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const REPACK_DATA_FILE: &str = "repack_data.json";

/// Latest record per normalized container key, persisted in the output directory
pub type RepackStore = CachedObject<BTreeMap<String, RepackedBundleData>>;

/// What happened to one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RepackOutcome {
    /// The stored record already covers the request
    Skipped { data: RepackedBundleData },
    Repacked { data: RepackedBundleData },
    /// Non-fatal failure for this container only
    Failed { error: String },
}

impl RepackOutcome {
    pub fn data(&self) -> Option<&RepackedBundleData> {
        match self {
            RepackOutcome::Skipped { data } | RepackOutcome::Repacked { data } => Some(data),
            RepackOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepackReport {
    pub container: String,
    pub key: String,
    #[serde(flatten)]
    pub outcome: RepackOutcome,
}

pub type CompletionCallback = Box<dyn Fn(&RepackReport) + Send + Sync>;

/// Host-facing repack driver
pub struct RepackManager {
    catalog: Arc<dyn BundleCatalog>,
    writer: Arc<dyn ContainerWriter>,
    policy: VersionPolicy,
    scan: ScanConfig,
    output_dir: PathBuf,
    store: RepackStore,
    locks: KeyedLockManager<String>,
    on_complete: Option<CompletionCallback>,
}

impl RepackManager {
    /// Load `repack_data.json` from `output_dir`; a missing or stale store starts empty.
    pub fn open(
        catalog: Arc<dyn BundleCatalog>,
        writer: Arc<dyn ContainerWriter>,
        policy: VersionPolicy,
        scan: ScanConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ApiError> {
        let output_dir = output_dir.into();
        let store = CachedObject::load_or_create(
            output_dir.join(REPACK_DATA_FILE),
            policy.clone(),
            || Ok(BTreeMap::new()),
        )?;
        Ok(Self {
            catalog,
            writer,
            policy,
            scan,
            output_dir,
            store,
            locks: KeyedLockManager::new(),
            on_complete: None,
        })
    }

    /// Called synchronously after each container finishes, whatever the outcome.
    pub fn on_complete(mut self, callback: impl Fn(&RepackReport) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Stored record for a container name, by normalized key
    pub fn stored(&self, container: &str) -> Option<RepackedBundleData> {
        self.store.read().get(&normalize_container_key(container)).cloned()
    }

    /// Repack every container of `requests`.
    ///
    /// Fatal errors abort the batch; anything else is reported per container.
    pub fn repack_all(
        &self,
        requests: &BTreeMap<String, Vec<String>>,
        index: Option<&BundleIndex>,
    ) -> Result<Vec<RepackReport>, ApiError> {
        let mut reports = Vec::with_capacity(requests.len());
        for (container, paths) in requests {
            reports.push(self.repack(container, paths, index)?);
        }
        Ok(reports)
    }

    /// Repack one container unless its stored record already covers `paths`.
    pub fn repack(
        &self,
        container: &str,
        paths: &[String],
        index: Option<&BundleIndex>,
    ) -> Result<RepackReport, ApiError> {
        let key = normalize_container_key(container);
        let lock = self.locks.get_lock(&key);
        let _guard = lock.write();

        let existing = self.store.read().get(&key).cloned();
        let outcome = match existing {
            Some(data) if self.covers(&data, paths) => {
                debug!(container, key = %key, "stored repack covers request, skipping");
                RepackOutcome::Skipped { data }
            }
            existing => match self.run(container, &key, paths, existing.as_ref(), index) {
                Ok(data) => RepackOutcome::Repacked { data },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(container, error = %e, "repack failed");
                    RepackOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            },
        };

        let report = RepackReport {
            container: container.to_string(),
            key,
            outcome,
        };
        if let Some(callback) = &self.on_complete {
            callback(&report);
        }
        Ok(report)
    }

    fn is_current(&self, data: &RepackedBundleData) -> bool {
        match data.version_stamp() {
            Some(stamp) => self.policy.accepts(&stamp),
            None => false,
        }
    }

    fn covers(&self, data: &RepackedBundleData, paths: &[String]) -> bool {
        self.is_current(data) && paths.iter().all(|path| data.tried_to_repack(path))
    }

    fn run(
        &self,
        container: &str,
        key: &str,
        paths: &[String],
        existing: Option<&RepackedBundleData>,
        index: Option<&BundleIndex>,
    ) -> Result<RepackedBundleData, ApiError> {
        let mut request: BTreeSet<String> = paths.iter().cloned().collect();
        // A stale record's paths may no longer exist in the current content
        if let Some(previous) = existing.filter(|data| self.is_current(data)) {
            request.extend(previous.covered_paths().map(str::to_string));
        }
        let request: Vec<String> = request.into_iter().collect();

        let handle = Arc::new(self.catalog.open(container)?);
        let mut repacker = StrippedRepacker::new(self.writer.as_ref(), &self.policy, self.scan);
        if let Some(index) = index {
            repacker = repacker.with_index(index);
        }
        let data = repacker.repack(container, handle, &request, &self.output_dir)?;

        self.store
            .update(|records| records.insert(key.to_string(), data.clone()));
        self.store.flush()?;
        info!(container, key, paths = request.len(), "repack stored");
        Ok(data)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ToolVersion;
    use crate::container::{ContainerHandle, MemoryContainer};
    use crate::repack::RepackPlan;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn scene(cab: &str) -> ContainerHandle {
        let mut c = MemoryContainer::new(cab);
        c.insert_game_object(1, "Root", &[2])
            .insert_transform(2, 1, 0, &[4, 6])
            .insert_game_object(3, "A", &[4])
            .insert_transform(4, 3, 2, &[])
            .insert_game_object(5, "B", &[6])
            .insert_transform(6, 5, 2, &[]);
        ContainerHandle::new(c)
    }

    struct OneScene;

    impl BundleCatalog for OneScene {
        fn bundle_keys(&self) -> Result<Vec<String>, ApiError> {
            Ok(vec!["tut_01.bundle".to_string()])
        }

        fn open(&self, bundle_key: &str) -> Result<ContainerHandle, ApiError> {
            if normalize_container_key(bundle_key) != "tut_01.bundle" && bundle_key != "tut_01" {
                return Err(ApiError::ContainerNotFound(bundle_key.to_string()));
            }
            Ok(scene("CAB-tut"))
        }
    }

    /// Every key opens its own copy of the same scene
    struct AnyScene;

    impl BundleCatalog for AnyScene {
        fn bundle_keys(&self) -> Result<Vec<String>, ApiError> {
            Ok(Vec::new())
        }

        fn open(&self, bundle_key: &str) -> Result<ContainerHandle, ApiError> {
            Ok(scene(&format!("CAB-{}", bundle_key)))
        }
    }

    #[derive(Default)]
    struct CountingWriter {
        plans: Mutex<Vec<RepackPlan>>,
    }

    impl ContainerWriter for CountingWriter {
        fn write(&self, plan: &RepackPlan) -> Result<(), ApiError> {
            self.plans.lock().push(plan.clone());
            Ok(())
        }
    }

    fn policy(tool: ToolVersion) -> VersionPolicy {
        VersionPolicy::new("1.2.3", "0.1.0").unwrap().with_tool_version(tool)
    }

    fn manager(out: &Path, writer: Arc<CountingWriter>, tool: ToolVersion) -> RepackManager {
        RepackManager::open(Arc::new(OneScene), writer, policy(tool), ScanConfig::default(), out).unwrap()
    }

    fn manager_with(out: &Path, catalog: Arc<dyn BundleCatalog>) -> RepackManager {
        let writer = Arc::new(CountingWriter::default());
        RepackManager::open(catalog, writer, policy(ToolVersion::new(0, 3, 1)), ScanConfig::default(), out)
            .unwrap()
    }

    fn request(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_covered_request_is_skipped() {
        let out = TempDir::new().unwrap();
        let writer = Arc::new(CountingWriter::default());
        let manager = manager(out.path(), writer.clone(), ToolVersion::new(0, 3, 1));

        let first = manager.repack("tut_01.bundle", &request(&["Root/A"]), None).unwrap();
        assert!(matches!(first.outcome, RepackOutcome::Repacked { .. }));

        let second = manager.repack("tut_01.bundle", &request(&["Root/A"]), None).unwrap();
        assert!(matches!(second.outcome, RepackOutcome::Skipped { .. }));
        assert_eq!(writer.plans.lock().len(), 1);
    }

    #[test]
    fn test_new_paths_are_unioned_with_stored_record() {
        let out = TempDir::new().unwrap();
        let writer = Arc::new(CountingWriter::default());
        let manager = manager(out.path(), writer.clone(), ToolVersion::new(0, 3, 1));

        manager.repack("tut_01.bundle", &request(&["Root/A", "Ghost"]), None).unwrap();
        let report = manager.repack("tut_01.bundle", &request(&["Root/B"]), None).unwrap();

        let data = report.outcome.data().unwrap();
        assert!(data.can_load("Root/A").is_some());
        assert!(data.can_load("Root/B").is_some());
        assert_eq!(data.non_repacked_assets, request(&["Ghost"]));
        assert_eq!(manager.stored("tut_01.bundle").as_ref(), Some(data));
    }

    #[test]
    fn test_store_persists_and_respects_versions() {
        let out = TempDir::new().unwrap();
        let writer = Arc::new(CountingWriter::default());
        {
            let manager = manager(out.path(), writer.clone(), ToolVersion::new(0, 3, 1));
            manager.repack("tut_01.bundle", &request(&["Root/A"]), None).unwrap();
        }
        assert!(out.path().join(REPACK_DATA_FILE).exists());

        let reopened = manager(out.path(), writer.clone(), ToolVersion::new(0, 3, 1));
        let report = reopened.repack("tut_01.bundle", &request(&["Root/A"]), None).unwrap();
        assert!(matches!(report.outcome, RepackOutcome::Skipped { .. }));

        // A store written by 0.3.1 is newer than this tool
        let older = manager(out.path(), writer.clone(), ToolVersion::new(0, 3, 0));
        assert!(older.stored("tut_01.bundle").is_none());
        let report = older.repack("tut_01.bundle", &request(&["Root/A"]), None).unwrap();
        assert!(matches!(report.outcome, RepackOutcome::Repacked { .. }));
    }

    #[test]
    fn test_missing_container_fails_alone_and_callback_fires() {
        let out = TempDir::new().unwrap();
        let writer = Arc::new(CountingWriter::default());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let manager = manager(out.path(), writer, ToolVersion::new(0, 3, 1))
            .on_complete(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let mut requests = BTreeMap::new();
        requests.insert("other.bundle".to_string(), request(&["Root"]));
        requests.insert("tut_01.bundle".to_string(), request(&["Root/B"]));
        let reports = manager.repack_all(&requests, None).unwrap();

        assert!(matches!(reports[0].outcome, RepackOutcome::Failed { .. }));
        assert!(matches!(reports[1].outcome, RepackOutcome::Repacked { .. }));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_record_paths_are_not_carried_over() {
        let out = TempDir::new().unwrap();
        let writer = Arc::new(CountingWriter::default());
        let manager = manager(out.path(), writer, ToolVersion::new(0, 3, 1));

        let mut stale = RepackedBundleData {
            content_version: Some("0.9".to_string()),
            tool_version: Some("0.3.1".to_string()),
            ..RepackedBundleData::default()
        };
        stale
            .game_object_assets
            .insert("assets/repacked/tut_01/root/a.prefab".to_string(), "Root/A".to_string());
        manager
            .store
            .update(|records| records.insert("tut_01.bundle".to_string(), stale));

        let report = manager.repack("tut_01.bundle", &request(&["Root/B"]), None).unwrap();
        let data = report.outcome.data().unwrap();
        assert!(data.can_load("Root/B").is_some());
        assert!(data.can_load("Root/A").is_none());
        assert_eq!(data.content_version.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn test_parallel_repacks_of_distinct_containers() {
        let out = TempDir::new().unwrap();
        let writer = Arc::new(CountingWriter::default());
        let manager = Arc::new(
            RepackManager::open(
                Arc::new(AnyScene),
                writer.clone(),
                policy(ToolVersion::new(0, 3, 1)),
                ScanConfig::default(),
                out.path(),
            )
            .unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    (0..4)
                        .map(|i| {
                            let container = format!("level_{}_{}.bundle", t, i);
                            manager.repack(&container, &request(&["Root/A"]), None).unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for report in handle.join().unwrap() {
                assert!(matches!(report.outcome, RepackOutcome::Repacked { .. }));
            }
        }
        assert_eq!(writer.plans.lock().len(), 32);
        assert_eq!(manager.store.read().len(), 32);

        let reopened = manager_with(out.path(), Arc::new(AnyScene));
        assert!(reopened.stored("level_7_3.bundle").is_some());
        assert!(!out.path().join(format!("{}.tmp", REPACK_DATA_FILE)).exists());
    }
}
