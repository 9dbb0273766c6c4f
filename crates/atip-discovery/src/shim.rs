// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pre-authored manifests for tools that cannot be probed.

use std::path::{Path, PathBuf};

use atip_core::{RegistryEntry, ScanError};
use atip_manifest::{Manifest, parse_manifest};
use serde_json::Value;

/// A manifest loaded from the shims directory.
#[derive(Debug, Clone)]
pub struct Shim {
    pub path: PathBuf,
    pub manifest: Manifest,
    pub raw: Value,
}

impl Shim {
    pub fn entry(&self) -> RegistryEntry {
        RegistryEntry::shim(
            self.manifest.name.clone(),
            self.manifest.version.clone(),
            self.path.clone(),
        )
    }
}

/// Loads every `*.json` file in `dir`, sorted by file name.
///
/// A missing directory yields nothing. Files that fail to parse or validate
/// are reported as errors and skipped.
pub fn load_shims(dir: &Path) -> (Vec<Shim>, Vec<ScanError>) {
    let mut shims = Vec::new();
    let mut errors = Vec::new();

    let Ok(entries) = std::fs::read_dir(dir) else {
        return (shims, errors);
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    for path in files {
        match read_shim(&path) {
            Ok(shim) => shims.push(shim),
            Err(message) => {
                tracing::warn!(path = %path.display(), error = %message, "invalid shim");
                errors.push(ScanError { path, message });
            }
        }
    }

    (shims, errors)
}

fn read_shim(path: &Path) -> Result<Shim, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read shim: {e}"))?;
    let raw: Value = serde_json::from_str(&text).map_err(|e| format!("invalid JSON: {e}"))?;
    let manifest = parse_manifest(raw.clone()).map_err(|issues| {
        issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    })?;
    Ok(Shim {
        path: path.to_path_buf(),
        manifest,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use atip_core::ToolSource;

    use super::*;

    #[test]
    fn loads_valid_shims_and_reports_bad_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("curl.json"),
            r#"{"atip":"0.4","name":"curl","version":"8.5.0","description":"transfer URLs"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{nope").unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let (shims, errors) = load_shims(dir.path());
        assert_eq!(shims.len(), 1);
        assert_eq!(shims[0].manifest.name, "curl");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("invalid JSON"));

        let entry = shims[0].entry();
        assert_eq!(entry.source, ToolSource::Shim);
        assert_eq!(entry.path, dir.path().join("curl.json"));
        assert!(entry.mod_time.is_none());
    }

    #[test]
    fn schema_errors_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.json"), r#"{"atip":"0.4","name":"x"}"#).unwrap();
        let (shims, errors) = load_shims(dir.path());
        assert!(shims.is_empty());
        assert!(errors[0].message.contains("version"));
        assert!(errors[0].message.contains("description"));
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (shims, errors) = load_shims(&dir.path().join("shims"));
        assert!(shims.is_empty() && errors.is_empty());
    }
}
