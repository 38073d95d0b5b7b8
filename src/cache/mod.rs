//! Version-gated persisted caches
//!
//! Every cache file carries the host-content version and the tool version that produced it.
//! An entry is reused only when the content version matches exactly and the producing tool
//! version lies in `[min_tool_version, current]` with the current major version. Anything else
//! is stale and regenerated transparently.

pub mod store;

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use store::{CacheStore, CachedObject};

/// Three-component tool version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ToolVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Version of the running crate
    pub fn current() -> Self {
        // CARGO_PKG_VERSION is always three numeric components
        Self::new(
            env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        )
    }
}

impl FromStr for ToolVersion {
    type Err = ApiError;

    /// `"X.Y.Z"`; missing trailing components default to 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ApiError::InvalidVersion(s.to_string());
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let mut parts = [0u64; 3];
        let mut count = 0;
        for component in trimmed.split('.') {
            if count == parts.len() {
                return Err(invalid());
            }
            parts[count] = component.parse().map_err(|_| invalid())?;
            count += 1;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Version stamps stored with a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStamp {
    pub content_version: String,
    pub tool_version: String,
}

/// Why an entry was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    ContentVersion { stored: String, expected: String },
    UnparsableToolVersion(String),
    BelowFloor(ToolVersion),
    NewerThanCurrent(ToolVersion),
    MajorMismatch(ToolVersion),
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::ContentVersion { stored, expected } => {
                write!(f, "content version {} does not match {}", stored, expected)
            }
            Staleness::UnparsableToolVersion(v) => write!(f, "unparsable tool version '{}'", v),
            Staleness::BelowFloor(v) => write!(f, "tool version {} is below the floor", v),
            Staleness::NewerThanCurrent(v) => write!(f, "tool version {} is newer than this tool", v),
            Staleness::MajorMismatch(v) => write!(f, "tool version {} has another major version", v),
        }
    }
}

/// Acceptance rule for persisted entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPolicy {
    pub content_version: String,
    pub tool_version: ToolVersion,
    pub min_tool_version: ToolVersion,
}

impl VersionPolicy {
    /// Policy for the running tool
    pub fn new(content_version: impl Into<String>, min_tool_version: &str) -> Result<Self, ApiError> {
        Ok(Self {
            content_version: content_version.into(),
            tool_version: ToolVersion::current(),
            min_tool_version: min_tool_version.parse()?,
        })
    }

    pub fn with_tool_version(mut self, tool_version: ToolVersion) -> Self {
        self.tool_version = tool_version;
        self
    }

    /// Stamp written with new entries
    pub fn stamp(&self) -> VersionStamp {
        VersionStamp {
            content_version: self.content_version.clone(),
            tool_version: self.tool_version.to_string(),
        }
    }

    pub fn staleness(&self, stamp: &VersionStamp) -> Option<Staleness> {
        if stamp.content_version != self.content_version {
            return Some(Staleness::ContentVersion {
                stored: stamp.content_version.clone(),
                expected: self.content_version.clone(),
            });
        }
        let version: ToolVersion = match stamp.tool_version.parse() {
            Ok(v) => v,
            Err(_) => return Some(Staleness::UnparsableToolVersion(stamp.tool_version.clone())),
        };
        if version < self.min_tool_version {
            return Some(Staleness::BelowFloor(version));
        }
        if version > self.tool_version {
            return Some(Staleness::NewerThanCurrent(version));
        }
        if version.major != self.tool_version.major {
            return Some(Staleness::MajorMismatch(version));
        }
        None
    }

    pub fn accepts(&self, stamp: &VersionStamp) -> bool {
        self.staleness(stamp).is_none()
    }
}
