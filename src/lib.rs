//! bundle-repack: dependency resolution and minimal repacking of serialized asset containers
//!
//! Resolves which objects a requested set of hierarchy paths needs, directly and transitively,
//! and selects the minimal object set a self-contained sub-bundle must carry to load them.

pub mod bundles;
pub mod cache;
pub mod concurrency;
pub mod config;
pub mod container;
pub mod context;
pub mod deps;
pub mod error;
pub mod hierarchy;
pub mod logging;
pub mod objpath;
pub mod repack;
pub mod tooling;
pub mod types;
