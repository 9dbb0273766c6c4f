// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./atip.toml` > `~/.config/atip/atip.toml` > `/etc/atip/atip.toml`
//! with environment variable overrides via `ATIP_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AtipConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/atip/atip.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "atip.toml";

/// Per-user config file under the XDG config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("atip/atip.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/atip/atip.toml` (system-wide)
/// 3. `~/.config/atip/atip.toml` (user XDG config)
/// 4. `./atip.toml` (local directory)
/// 5. `ATIP_*` environment variables
pub fn load_config() -> Result<AtipConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<AtipConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AtipConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AtipConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AtipConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AtipConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys themselves
/// contain underscores: `ATIP_DISCOVERY_SCAN_TIMEOUT_MS` must map to
/// `discovery.scan_timeout_ms`, not `discovery.scan.timeout.ms`.
pub fn env_provider() -> Env {
    Env::prefixed("ATIP_")
        .filter(|key| {
            // Unrelated ATIP_* variables (e.g. ATIP_PROBE) are not config keys.
            let k = key.as_str().to_ascii_lowercase();
            k.starts_with("discovery_") || k.starts_with("storage_") || k.starts_with("logging_")
        })
        .map(|key| {
            // Figment lowercases after mapping, so normalize here first.
            let key_str = key.as_str().to_ascii_lowercase();
            let mapped = key_str
                .replacen("discovery_", "discovery.", 1)
                .replacen("storage_", "storage.", 1)
                .replacen("logging_", "logging.", 1);
            mapped.into()
        })
}
