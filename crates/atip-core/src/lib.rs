// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for atip-discover.
//!
//! Provides the error type and the data model shared by the registry store,
//! the prober, and the scanner: registry entries, scan results, validation
//! issues, and the resolved data paths.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::AtipError;
pub use types::{
    DataPaths, RegistryEntry, ScanError, ScanResult, ToolSource, ValidationIssue,
};

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::str::FromStr;
    use std::time::Duration;

    use super::*;

    #[test]
    fn tool_source_display_and_parse() {
        for source in [ToolSource::Native, ToolSource::Shim] {
            let s = source.to_string();
            assert_eq!(ToolSource::from_str(&s).unwrap(), source);
        }
        assert_eq!(ToolSource::Native.to_string(), "native");
        assert!(ToolSource::from_str("bundled").is_err());
    }

    #[test]
    fn tool_source_serializes_lowercase() {
        let json = serde_json::to_string(&ToolSource::Shim).unwrap();
        assert_eq!(json, "\"shim\"");
    }

    #[test]
    fn registry_entry_uses_camel_case_keys() {
        let entry = RegistryEntry::native("gh", "2.40.0", "/usr/bin/gh", None);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["name"], "gh");
        assert_eq!(value["source"], "native");
        assert!(value.get("modTime").is_none());
        assert!(value.get("discoveredAt").is_none());
    }

    #[test]
    fn shim_entry_has_no_mod_time() {
        let entry = RegistryEntry::shim("curl", "8.0.0", "/shims/curl.json");
        assert_eq!(entry.source, ToolSource::Shim);
        assert!(entry.mod_time.is_none());
    }

    #[test]
    fn scan_result_records_errors_as_partial() {
        let mut result = ScanResult::default();
        assert!(!result.is_partial());

        result.record_error(Path::new("/usr/bin/broken"), "invalid JSON");
        assert!(result.is_partial());
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors[0].path, PathBuf::from("/usr/bin/broken"));
    }

    #[test]
    fn scan_result_duration_serializes_as_millis() {
        let result = ScanResult {
            duration: Duration::from_millis(1500),
            ..Default::default()
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["durationMs"], 1500);
    }

    #[test]
    fn validation_issue_display_includes_path() {
        let issue = ValidationIssue::new("commands.deploy", "missing description");
        assert_eq!(issue.to_string(), "commands.deploy: missing description");
        let root = ValidationIssue::new("", "document must be an object");
        assert_eq!(root.to_string(), "document must be an object");
    }

    #[test]
    fn validation_error_lists_every_issue() {
        let err = AtipError::Validation {
            path: PathBuf::from("/bin/tool"),
            errors: vec![
                ValidationIssue::new("name", "required"),
                ValidationIssue::new("version", "required"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("name: required"));
        assert!(msg.contains("version: required"));
    }

    #[test]
    fn data_paths_layout() {
        let paths = DataPaths::from_data_dir(Path::new("/data/atip"));
        assert_eq!(paths.registry_file, PathBuf::from("/data/atip/registry.json"));
        assert_eq!(paths.tools_dir, PathBuf::from("/data/atip/tools"));
        assert_eq!(paths.shims_dir, PathBuf::from("/data/atip/shims"));
    }
}
