// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for atip-discover.
//!
//! TOML files are layered over compiled defaults (`/etc/atip/atip.toml`, the
//! user config dir, then `./atip.toml`), `ATIP_*` environment variables win
//! over all files, and unknown keys are rejected with typo suggestions.
//!
//! ```no_run
//! use atip_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("parallelism: {}", config.discovery.parallelism);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{AtipConfig, DiscoveryConfig, LoggingConfig, StorageConfig, expand_home};

/// Loads configuration from the standard hierarchy and validates it.
pub fn load_and_validate() -> Result<AtipConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Loads configuration from an inline TOML string and validates it.
pub fn load_and_validate_str(toml_content: &str) -> Result<AtipConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Loads configuration from an explicit file (plus env overrides) and validates it.
///
/// A missing file is an error here, unlike the implicit hierarchy lookup.
pub fn load_and_validate_path(path: &Path) -> Result<AtipConfig, Vec<ConfigError>> {
    if !path.is_file() {
        return Err(vec![ConfigError::Other(format!(
            "config file {} does not exist",
            path.display()
        ))]);
    }
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

fn finish(
    loaded: Result<AtipConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<AtipConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            tracing::debug!(
                data_dir = %config.storage.data_dir,
                parallelism = config.discovery.parallelism,
                "configuration loaded"
            );
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Reads every config file in the hierarchy so diagnostics can show spans.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(loader::LOCAL_CONFIG_FILE));
    }
    if let Some(user) = loader::user_config_path() {
        candidates.push(user);
    }
    candidates.push(Path::new(loader::SYSTEM_CONFIG_PATH).to_path_buf());

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
