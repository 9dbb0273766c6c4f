// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for atip-discover.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::{Path, PathBuf};

use atip_core::DataPaths;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AtipConfig {
    /// Scanner and prober settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Where the registry, manifest cache, and shims live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log verbosity.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AtipConfig {
    /// Resolves the data directory layout, expanding a leading `~/`.
    pub fn data_paths(&self) -> DataPaths {
        DataPaths::from_data_dir(&expand_home(&self.storage.data_dir))
    }

    /// Safe directories with `~/` expanded.
    pub fn safe_paths(&self) -> Vec<PathBuf> {
        self.discovery
            .safe_paths
            .iter()
            .map(|p| expand_home(p))
            .collect()
    }
}

/// Scanner and prober configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Directories scanned when no explicit paths are given. Each one must
    /// still pass the safe-path check.
    #[serde(default = "default_safe_paths")]
    pub safe_paths: Vec<String>,

    /// Executable names (exact or shell glob) that are never probed.
    #[serde(default = "default_skip_list")]
    pub skip_list: Vec<String>,

    /// Timeout for the `--agent` invocation, in milliseconds.
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,

    /// Timeout for the `--help` capability check, in milliseconds.
    /// Values below 1000 are raised to 1000.
    #[serde(default = "default_help_timeout_ms")]
    pub help_timeout_ms: u64,

    /// Number of concurrent probes.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Cap on captured stdout/stderr per invocation.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            safe_paths: default_safe_paths(),
            skip_list: default_skip_list(),
            scan_timeout_ms: default_scan_timeout_ms(),
            help_timeout_ms: default_help_timeout_ms(),
            parallelism: default_parallelism(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

fn default_safe_paths() -> Vec<String> {
    [
        "/usr/local/bin",
        "/usr/bin",
        "/opt/homebrew/bin",
        "~/.local/bin",
        "~/.cargo/bin",
        "~/go/bin",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_skip_list() -> Vec<String> {
    [
        "rm", "rmdir", "mv", "dd", "mkfs*", "fdisk", "shutdown", "reboot", "halt", "poweroff",
        "kill", "killall",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_scan_timeout_ms() -> u64 {
    2000
}

fn default_help_timeout_ms() -> u64 {
    1000
}

fn default_parallelism() -> usize {
    4
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

/// Data directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Holds `registry.json`, `tools/`, and `shims/`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("atip"))
        .unwrap_or_else(|| PathBuf::from(".atip"))
        .to_string_lossy()
        .into_owned()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Expands a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(path).to_path_buf()
}
