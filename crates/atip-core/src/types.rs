// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry and scan types shared across the atip-discover crates.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where a registry entry's manifest came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToolSource {
    /// Obtained by probing the executable directly.
    Native,
    /// Supplied out-of-band as a pre-authored manifest file.
    Shim,
}

/// One discovered tool in the registry.
///
/// `discovered_at` and `last_verified` are `None` only on entries that have
/// not yet passed through the registry store; the store fills them in on add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub source: ToolSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<DateTime<Utc>>,
}

impl RegistryEntry {
    /// Entry for a tool found by probing the executable at `path`.
    pub fn native(
        name: impl Into<String>,
        version: impl Into<String>,
        path: impl Into<PathBuf>,
        mod_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: path.into(),
            source: ToolSource::Native,
            discovered_at: None,
            last_verified: None,
            mod_time,
        }
    }

    /// Entry for a tool described by a shim manifest at `path`.
    pub fn shim(
        name: impl Into<String>,
        version: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: path.into(),
            source: ToolSource::Shim,
            discovered_at: None,
            last_verified: None,
            mod_time: None,
        }
    }
}

/// A single schema violation found by the manifest validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path to the offending field, e.g. `commands.deploy.description`.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A per-candidate failure recorded during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

/// Summary of one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub discovered: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(rename = "durationMs", with = "duration_ms")]
    pub duration: Duration,
    /// Entries that were newly added to the registry by this pass.
    pub tools: Vec<RegistryEntry>,
    pub errors: Vec<ScanError>,
    /// True when the pass was cut short by cancellation.
    #[serde(default)]
    pub cancelled: bool,
}

impl ScanResult {
    /// A scan that finished but recorded at least one per-candidate failure.
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty() || self.cancelled
    }

    pub fn record_error(&mut self, path: &Path, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(ScanError {
            path: path.to_path_buf(),
            message: message.into(),
        });
    }
}

/// Filesystem locations derived once from configuration at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    /// The persisted registry document.
    pub registry_file: PathBuf,
    /// One cached manifest per discovered tool.
    pub tools_dir: PathBuf,
    /// Pre-authored shim manifests.
    pub shims_dir: PathBuf,
}

impl DataPaths {
    /// Standard layout under a single data directory.
    pub fn from_data_dir(data_dir: &Path) -> Self {
        Self {
            registry_file: data_dir.join("registry.json"),
            tools_dir: data_dir.join("tools"),
            shims_dir: data_dir.join("shims"),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
