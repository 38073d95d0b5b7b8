//! JSON cache files wrapped in a version envelope.

use super::{VersionPolicy, VersionStamp};
use crate::error::{ApiError, StorageError};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct Envelope<V> {
    #[serde(flatten)]
    stamp: VersionStamp,
    value: V,
}

/// Directory of version-gated cache files
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    policy: VersionPolicy,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>, policy: VersionPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> &VersionPolicy {
        &self.policy
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Load `file` from this store, calling `create` when it is missing or stale.
    pub fn load_or_create<T, F>(&self, file: &str, create: F) -> Result<CachedObject<T>, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, ApiError>,
    {
        CachedObject::load_or_create(self.path(file), self.policy.clone(), create)
    }
}

/// A cached value backed by one file
pub struct CachedObject<T> {
    path: PathBuf,
    policy: VersionPolicy,
    value: RwLock<T>,
    dirty: AtomicBool,
    /// One writer of the backing file at a time
    flushing: Mutex<()>,
}

impl<T> CachedObject<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn load_or_create<F>(path: PathBuf, policy: VersionPolicy, create: F) -> Result<Self, ApiError>
    where
        F: FnOnce() -> Result<T, ApiError>,
    {
        let (value, dirty) = match read_valid(&path, &policy) {
            Some(value) => {
                debug!(path = %path.display(), "cache hit");
                (value, false)
            }
            None => (create()?, true),
        };
        Ok(Self {
            path,
            policy,
            value: RwLock::new(value),
            dirty: AtomicBool::new(dirty),
            flushing: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.value.read()
    }

    /// Mutate in place; the object is written on the next flush.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.value.write();
        self.dirty.store(true, Ordering::Release);
        f(&mut guard)
    }

    pub fn replace(&self, value: T) {
        self.update(|current| *current = value);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write the whole envelope to `<file>.tmp`, then rename it over the target.
    ///
    /// Concurrent flushes of one object are serialized. An update racing a flush leaves the
    /// object dirty.
    pub fn flush(&self) -> Result<(), StorageError> {
        let _flushing = self.flushing.lock();
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.write_file();
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        }
        result
    }

    fn write_file(&self) -> Result<(), StorageError> {
        let json = {
            let guard = self.value.read();
            let envelope = Envelope {
                stamp: self.policy.stamp(),
                value: &*guard,
            };
            serde_json::to_vec_pretty(&envelope)
                .map_err(|e| StorageError::Serialization(e.to_string()))?
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "cache flushed");
        Ok(())
    }
}

fn read_valid<T: DeserializeOwned>(path: &Path, policy: &VersionPolicy) -> Option<T> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cache miss");
            return None;
        }
    };
    let envelope: Envelope<serde_json::Value> = match serde_json::from_slice(&content) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable cache file, regenerating");
            return None;
        }
    };
    if let Some(reason) = policy.staleness(&envelope.stamp) {
        warn!(path = %path.display(), %reason, "stale cache, regenerating");
        return None;
    }
    match serde_json::from_value(envelope.value) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cache value has an unexpected shape, regenerating");
            None
        }
    }
}
