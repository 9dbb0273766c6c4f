// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks run after deserialization.

use crate::diagnostic::ConfigError;
use crate::model::AtipConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates a deserialized configuration.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_config(config: &AtipConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let discovery = &config.discovery;

    if discovery.parallelism == 0 {
        errors.push(ConfigError::validation(
            "discovery.parallelism must be at least 1",
        ));
    }

    if discovery.scan_timeout_ms == 0 {
        errors.push(ConfigError::validation(
            "discovery.scan_timeout_ms must be greater than 0",
        ));
    }

    if discovery.max_output_bytes == 0 {
        errors.push(ConfigError::validation(
            "discovery.max_output_bytes must be greater than 0",
        ));
    }

    for pattern in &discovery.skip_list {
        if let Err(e) = glob::Pattern::new(pattern) {
            errors.push(ConfigError::validation(format!(
                "discovery.skip_list entry `{pattern}` is not a valid glob: {e}"
            )));
        }
    }

    for path in &discovery.safe_paths {
        if path.trim().is_empty() {
            errors.push(ConfigError::validation(
                "discovery.safe_paths must not contain empty entries",
            ));
        }
    }

    if config.storage.data_dir.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.data_dir must not be empty",
        ));
    }

    let level = config.logging.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.log_level `{}` is not one of {}",
            config.logging.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
