//! Built-in defaults, the lowest-precedence layer.

use crate::config::RepackConfig;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = RepackConfig::default();
    config::Config::builder()
        .set_default("paths.bundle_dir", path_default(&defaults.paths.bundle_dir))?
        .set_default("paths.cache_dir", path_default(&defaults.paths.cache_dir))?
        .set_default("paths.output_dir", path_default(&defaults.paths.output_dir))?
        .set_default("versions.content_version", defaults.versions.content_version)?
        .set_default("versions.min_tool_version", defaults.versions.min_tool_version)?
        .set_default(
            "dependencies.follow_transform_parent",
            defaults.dependencies.follow_transform_parent,
        )?
        .set_default("logging.enabled", defaults.logging.enabled)?
        .set_default("logging.level", defaults.logging.level)?
        .set_default("logging.format", defaults.logging.format)?
        .set_default("logging.output", defaults.logging.output)?
        .set_default("logging.color", defaults.logging.color)
}

fn path_default(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}
