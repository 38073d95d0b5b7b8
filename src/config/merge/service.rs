//! MergeService: orchestrates sources, applies merge policy, deserializes to RepackConfig.

use super::policy;
use crate::config::sources::{environment, file};
use crate::config::RepackConfig;
use config::ConfigError;
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> global file -> explicit file -> environment (highest).
    pub fn load(global: Option<&Path>, explicit: Option<&Path>) -> Result<RepackConfig, ConfigError> {
        let mut builder = policy::builder_with_defaults()?;
        if let Some(global) = global {
            builder = file::add_global(builder, global);
        }
        if let Some(explicit) = explicit {
            builder = file::add_explicit(builder, explicit);
        }
        let builder = environment::add_to_builder(builder);

        builder.build()?.try_deserialize()
    }
}
