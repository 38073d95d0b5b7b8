//! Configuration
//!
//! Layered configuration via the `config` crate. Sources, lowest precedence first:
//! built-in defaults, `$XDG_CONFIG_HOME/bundle-repack/config.toml`, a file given with
//! `--config`, then `BUNDLE_REPACK__<SECTION>__<KEY>` environment variables.
//!
//! ```toml
//! [paths]
//! bundle_dir = "/games/example/StreamingAssets/aa/StandaloneLinux64"
//!
//! [versions]
//! content_version = "1.0.28324"
//! min_tool_version = "0.3.0"
//!
//! [dependencies]
//! follow_transform_parent = false
//! ```

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

use crate::cache::VersionPolicy;
use crate::deps::ScanConfig;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use facade::ConfigLoader;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepackConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub versions: VersionsConfig,
    #[serde(default)]
    pub dependencies: DependencyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Directory layout. Empty paths resolve to platform defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the `.bundle` container dumps
    #[serde(default)]
    pub bundle_dir: PathBuf,
    /// Version-gated cache files
    #[serde(default)]
    pub cache_dir: PathBuf,
    /// Repack plans and `repack_data.json`
    #[serde(default)]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionsConfig {
    /// Version of the host content the caches describe
    #[serde(default = "default_content_version")]
    pub content_version: String,
    /// Oldest tool version whose caches are still accepted
    #[serde(default = "default_min_tool_version")]
    pub min_tool_version: String,
}

fn default_content_version() -> String {
    "unknown".to_string()
}

fn default_min_tool_version() -> String {
    "0.1.0".to_string()
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self {
            content_version: default_content_version(),
            min_tool_version: default_min_tool_version(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConfig {
    #[serde(default)]
    pub follow_transform_parent: bool,
}

/// Concrete directories after defaults are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub bundle_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl RepackConfig {
    /// Fill empty directories: cache under `$XDG_CACHE_HOME/bundle-repack`, output under
    /// `<cache_dir>/repacked`. The bundle directory has no default.
    pub fn resolved_paths(&self) -> Result<ResolvedPaths, ApiError> {
        let cache_dir = if self.paths.cache_dir.as_os_str().is_empty() {
            paths::xdg_root::default_cache_dir()?
        } else {
            self.paths.cache_dir.clone()
        };
        let output_dir = if self.paths.output_dir.as_os_str().is_empty() {
            cache_dir.join("repacked")
        } else {
            self.paths.output_dir.clone()
        };
        Ok(ResolvedPaths {
            bundle_dir: self.paths.bundle_dir.clone(),
            cache_dir,
            output_dir,
        })
    }

    pub fn version_policy(&self) -> Result<VersionPolicy, ApiError> {
        VersionPolicy::new(
            self.versions.content_version.clone(),
            &self.versions.min_tool_version,
        )
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            follow_transform_parent: self.dependencies.follow_transform_parent,
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(self)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render configuration: {}", e)))
    }
}
