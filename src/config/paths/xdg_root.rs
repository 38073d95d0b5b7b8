//! XDG Base Directory utilities.

use crate::error::ApiError;
use std::path::PathBuf;

pub const APP_DIR: &str = "bundle-repack";

fn home() -> Result<PathBuf, ApiError> {
    std::env::var("HOME").map(PathBuf::from).map_err(|_| {
        ApiError::ConfigError("Could not determine home directory (HOME not set)".to_string())
    })
}

/// `$XDG_CONFIG_HOME`, otherwise `$HOME/.config`
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }
    Ok(home()?.join(".config"))
}

/// `$XDG_CACHE_HOME`, otherwise `$HOME/.cache`
pub fn cache_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_cache_home) = std::env::var("XDG_CACHE_HOME") {
        if !xdg_cache_home.is_empty() {
            return Ok(PathBuf::from(xdg_cache_home));
        }
    }
    Ok(home()?.join(".cache"))
}

/// `$XDG_CONFIG_HOME/bundle-repack/config.toml`
pub fn global_config_file() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join(APP_DIR).join("config.toml"))
}

/// `$XDG_CACHE_HOME/bundle-repack`
pub fn default_cache_dir() -> Result<PathBuf, ApiError> {
    Ok(cache_home()?.join(APP_DIR))
}
