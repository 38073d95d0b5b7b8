//! CLI Tooling
//!
//! Command-line interface over the dependency resolver, the hierarchy index and the repack
//! manager. Every command renders either a text table or pretty JSON.

use crate::config::{ConfigLoader, RepackConfig};
use crate::context::RepackContext;
use crate::deps::{ChildRefs, DependencyStats};
use crate::error::{ApiError, StorageError};
use crate::hierarchy::HierarchyNode;
use crate::logging::init_logging;
use crate::repack::{RepackOutcome, RepackReport};
use crate::types::NodeId;
use clap::{Parser, Subcommand};
use comfy_table::presets::{UTF8_BORDERS_ONLY, UTF8_FULL};
use comfy_table::Table;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// bundle-repack - dependency resolution and minimal repacking of asset containers
#[derive(Parser)]
#[command(name = "bundle-repack")]
#[command(about = "Resolve object dependencies and repack minimal sub-bundles")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every resolved hierarchy path of a container
    Hierarchy {
        container: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Look up one hierarchy path
    Resolve {
        container: String,
        path: String,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show what an object references
    Deps {
        container: String,
        #[arg(allow_negative_numbers = true)]
        node_id: NodeId,
        /// Direct references only instead of the transitive closure
        #[arg(long)]
        immediate: bool,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Repack requested hierarchy paths into a minimal container
    Repack {
        /// Container to repack (omit with --request)
        container: Option<String>,
        /// Hierarchy paths to include
        paths: Vec<String>,
        /// JSON file mapping containers to requested paths
        #[arg(long, conflicts_with = "container")]
        request: Option<PathBuf>,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Containers a bundle depends on
    BundleDeps {
        bundle: String,
        /// Follow dependencies of dependencies
        #[arg(long)]
        transitive: bool,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration
    Config {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

/// CLI context over one runtime context
pub struct CliContext {
    context: RepackContext,
}

#[derive(Serialize)]
struct HierarchyOutput<'a> {
    container: &'a str,
    nodes: Vec<&'a HierarchyNode>,
}

#[derive(Serialize)]
struct ExternalOutput {
    file_index: i32,
    node_id: NodeId,
    origin: Option<String>,
}

#[derive(Serialize)]
struct DepsOutput<'a> {
    container: &'a str,
    node_id: NodeId,
    mode: &'static str,
    internal: Vec<NodeId>,
    external: Vec<ExternalOutput>,
    stats: DependencyStats,
}

#[derive(Serialize)]
struct BundleDepsOutput<'a> {
    bundle: &'a str,
    transitive: bool,
    dependencies: Vec<String>,
}

impl CliContext {
    /// Load configuration, start logging and build the runtime context.
    pub fn new(config_path: Option<PathBuf>, log_level: Option<String>) -> Result<Self, ApiError> {
        let mut config = ConfigLoader::load(config_path.as_deref())?;
        if let Some(level) = log_level {
            config.logging.level = level;
        }
        init_logging(Some(&config.logging))?;
        Self::from_config(config)
    }

    pub fn from_config(config: RepackConfig) -> Result<Self, ApiError> {
        Ok(Self {
            context: RepackContext::new(config)?,
        })
    }

    pub fn from_context(context: RepackContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &RepackContext {
        &self.context
    }

    /// Execute a CLI command, then flush caches touched by it.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let result = self.execute_inner(command);
        let flushed = self.context.flush();
        let output = result?;
        flushed?;
        Ok(output)
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Hierarchy { container, format } => self.handle_hierarchy(container, format),
            Commands::Resolve {
                container,
                path,
                format,
            } => self.handle_resolve(container, path, format),
            Commands::Deps {
                container,
                node_id,
                immediate,
                format,
            } => self.handle_deps(container, *node_id, *immediate, format),
            Commands::Repack {
                container,
                paths,
                request,
                format,
            } => {
                let requests = build_requests(container.as_deref(), paths, request.as_ref())?;
                self.handle_repack(&requests, format)
            }
            Commands::BundleDeps {
                bundle,
                transitive,
                format,
            } => self.handle_bundle_deps(bundle, *transitive, format),
            Commands::Config { format } => self.handle_config(format),
        }
    }

    fn handle_hierarchy(&self, container: &str, format: &str) -> Result<String, ApiError> {
        let json = wants_json(format)?;
        let hierarchy = self.context.hierarchy(container)?;
        if json {
            return to_json(&HierarchyOutput {
                container,
                nodes: hierarchy.iter().collect(),
            });
        }

        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Path", "GameObject", "Transform"]);
        for node in hierarchy.iter() {
            table.add_row(vec![
                node.path.clone(),
                node.object_id.to_string(),
                node.transform_id.to_string(),
            ]);
        }
        Ok(format!("{}\n\n{} objects", table, hierarchy.len()))
    }

    fn handle_resolve(&self, container: &str, path: &str, format: &str) -> Result<String, ApiError> {
        let json = wants_json(format)?;
        let hierarchy = self.context.hierarchy(container)?;
        let node = hierarchy.by_path(path)?;
        if json {
            return to_json(node);
        }
        Ok(format!(
            "Path: {}\nGameObject: {}\nTransform: {}",
            node.path, node.object_id, node.transform_id
        ))
    }

    fn handle_deps(
        &self,
        container: &str,
        node_id: NodeId,
        immediate: bool,
        format: &str,
    ) -> Result<String, ApiError> {
        let json = wants_json(format)?;
        let deps = self.context.dependencies(container)?;
        let refs = if immediate {
            deps.immediate(node_id)?
        } else {
            deps.closure(node_id)?
        };
        let output = DepsOutput {
            container,
            node_id,
            mode: if immediate { "immediate" } else { "closure" },
            internal: refs.internal.iter().copied().collect(),
            external: external_rows(&refs, |file_index| {
                deps.container()
                    .external_file(file_index)
                    .map(|file| file.path.clone())
            }),
            stats: deps.stats(),
        };
        if json {
            return to_json(&output);
        }
        Ok(format_deps_text(&output))
    }

    fn handle_repack(
        &self,
        requests: &BTreeMap<String, Vec<String>>,
        format: &str,
    ) -> Result<String, ApiError> {
        let json = wants_json(format)?;
        let index = self.context.bundle_index()?;
        let manager = self.context.repack_manager()?;
        let reports = manager.repack_all(requests, Some(index))?;
        info!(containers = reports.len(), "repack command finished");
        if json {
            return to_json(&reports);
        }
        Ok(format_repack_text(&reports))
    }

    fn handle_bundle_deps(&self, bundle: &str, transitive: bool, format: &str) -> Result<String, ApiError> {
        let json = wants_json(format)?;
        let index = self.context.bundle_index()?;
        let dependencies: Vec<String> = if transitive {
            index.transitive_deps(bundle)?.into_iter().collect()
        } else {
            index.direct_deps(bundle)?
        };
        let output = BundleDepsOutput {
            bundle,
            transitive,
            dependencies,
        };
        if json {
            return to_json(&output);
        }
        if output.dependencies.is_empty() {
            return Ok(format!("{} has no dependencies", bundle));
        }
        let mut out = format!("Dependencies of {}:\n", bundle);
        for dep in &output.dependencies {
            out.push_str(&format!("  - {}\n", dep));
        }
        Ok(out.trim_end().to_string())
    }

    fn handle_config(&self, format: &str) -> Result<String, ApiError> {
        match format {
            "toml" | "text" => self.context.config().to_toml_string(),
            "json" => to_json(self.context.config()),
            other => Err(unsupported_format(other)),
        }
    }
}

/// Merge positional arguments and a request file into one request map.
fn build_requests(
    container: Option<&str>,
    paths: &[String],
    request: Option<&PathBuf>,
) -> Result<BTreeMap<String, Vec<String>>, ApiError> {
    let mut requests = BTreeMap::new();
    if let Some(file) = request {
        let content = std::fs::read_to_string(file).map_err(StorageError::from)?;
        let parsed: BTreeMap<String, Vec<String>> = serde_json::from_str(&content).map_err(|e| {
            ApiError::ConfigError(format!("Invalid request file {}: {}", file.display(), e))
        })?;
        requests.extend(parsed);
    }
    if let Some(container) = container {
        if paths.is_empty() {
            return Err(ApiError::ConfigError(format!(
                "No hierarchy paths given for {}",
                container
            )));
        }
        requests.insert(container.to_string(), paths.to_vec());
    }
    if requests.is_empty() {
        return Err(ApiError::ConfigError(
            "Nothing to repack: pass a container and paths, or --request".to_string(),
        ));
    }
    Ok(requests)
}

fn wants_json(format: &str) -> Result<bool, ApiError> {
    match format {
        "json" => Ok(true),
        "text" => Ok(false),
        other => Err(unsupported_format(other)),
    }
}

fn unsupported_format(format: &str) -> ApiError {
    ApiError::ConfigError(format!("Unsupported output format: {}", format))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::Serialization(e.to_string())))
}

fn external_rows(refs: &ChildRefs, origin: impl Fn(i32) -> Option<String>) -> Vec<ExternalOutput> {
    refs.external
        .iter()
        .map(|r| ExternalOutput {
            file_index: r.file_index,
            node_id: r.node_id,
            origin: origin(r.file_index),
        })
        .collect()
}

fn format_deps_text(output: &DepsOutput<'_>) -> String {
    let mut out = format!(
        "{} of {} in {}: {} internal, {} external\n",
        output.mode,
        output.node_id,
        output.container,
        output.internal.len(),
        output.external.len()
    );
    if !output.internal.is_empty() {
        let ids: Vec<String> = output.internal.iter().map(|id| id.to_string()).collect();
        out.push_str(&format!("\nInternal: {}\n", ids.join(", ")));
    }
    if !output.external.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["File", "Object", "Origin"]);
        for row in &output.external {
            table.add_row(vec![
                row.file_index.to_string(),
                row.node_id.to_string(),
                row.origin.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        out.push_str(&format!("\n{}\n", table));
    }
    out.push_str(&format!(
        "\nCache: {} hits, {} misses",
        output.stats.hits, output.stats.misses
    ));
    out
}

fn format_repack_text(reports: &[RepackReport]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Container", "Status", "Entries", "Not repacked", "Bundle"]);
    for report in reports {
        let status = match &report.outcome {
            RepackOutcome::Skipped { .. } => "skipped".to_string(),
            RepackOutcome::Repacked { .. } => "repacked".to_string(),
            RepackOutcome::Failed { error } => format!("failed: {}", error),
        };
        let (entries, missing, bundle) = match report.outcome.data() {
            Some(data) => (
                data.game_object_assets.len().to_string(),
                data.non_repacked_assets.len().to_string(),
                data.bundle_name.clone().unwrap_or_else(|| "-".to_string()),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        table.add_row(vec![report.container.clone(), status, entries, missing, bundle]);
    }

    let mut out = table.to_string();
    for report in reports {
        let Some(data) = report.outcome.data() else {
            continue;
        };
        if data.game_object_assets.is_empty() && data.non_repacked_assets.is_empty() {
            continue;
        }
        out.push_str(&format!("\n\n{}\n", report.container));
        for (entry, anchor) in &data.game_object_assets {
            out.push_str(&format!("  {} <- {}\n", entry, anchor));
        }
        for path in &data.non_repacked_assets {
            out.push_str(&format!("  (not repacked) {}\n", path));
        }
        if !data.dependency_bundles.is_empty() {
            let bundles: Vec<&str> = data.dependency_bundles.iter().map(String::as_str).collect();
            out.push_str(&format!("  depends on: {}\n", bundles.join(", ")));
        }
    }
    out.trim_end().to_string()
}
