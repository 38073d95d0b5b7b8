//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::paths::xdg_root;
use super::RepackConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global file, an optional explicit file and the environment.
    pub fn load(explicit: Option<&Path>) -> Result<RepackConfig, ConfigError> {
        let global = xdg_root::global_config_file().ok();
        MergeService::load(global.as_deref(), explicit)
    }

    /// Load from one file plus the environment, ignoring the global file.
    pub fn load_from_file(path: &Path) -> Result<RepackConfig, ConfigError> {
        MergeService::load(None, Some(path))
    }

    pub fn default() -> RepackConfig {
        RepackConfig::default()
    }
}
