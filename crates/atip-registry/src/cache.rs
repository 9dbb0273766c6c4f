// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tool manifest cache.
//!
//! Each discovered tool's manifest is stored as `<tools_dir>/<name>.json`.
//! Files are keyed by tool name, so concurrent writers for different tools
//! never touch the same file.

use std::path::{Path, PathBuf};

use atip_core::AtipError;
use atip_manifest::is_valid_tool_name;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::atomic::write_atomic;

/// Summary of the cache directory contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub dir: PathBuf,
    pub entries: usize,
    pub total_bytes: u64,
}

/// Directory of cached manifests, one JSON file per tool.
#[derive(Debug, Clone)]
pub struct ManifestCache {
    dir: PathBuf,
}

impl ManifestCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cache file for `name`, rejecting names that would escape
    /// the cache directory.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, AtipError> {
        if !is_valid_tool_name(name) {
            return Err(AtipError::Config(format!(
                "tool name '{name}' cannot be used as a cache file name"
            )));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Writes a manifest atomically.
    pub fn write(&self, name: &str, manifest: &Value) -> Result<PathBuf, AtipError> {
        let path = self.path_for(name)?;
        let json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| AtipError::Internal(format!("failed to serialize manifest: {e}")))?;
        write_atomic(&path, &json).map_err(|e| {
            AtipError::io(format!("failed to write cache file '{}'", path.display()), e)
        })?;
        debug!(tool = name, path = %path.display(), "cached manifest");
        Ok(path)
    }

    /// Reads a cached manifest. Returns `None` when nothing is cached.
    pub fn read(&self, name: &str) -> Result<Option<Value>, AtipError> {
        let path = self.path_for(name)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AtipError::io(
                    format!("failed to read cache file '{}'", path.display()),
                    e,
                ));
            }
        };
        serde_json::from_str(&content).map(Some).map_err(|e| {
            AtipError::Internal(format!(
                "corrupt cache file '{}': {e}",
                path.display()
            ))
        })
    }

    /// Deletes the cached manifest for `name`. Missing files are not an error.
    pub fn remove(&self, name: &str) -> Result<bool, AtipError> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AtipError::io(
                format!("failed to remove cache file '{}'", path.display()),
                e,
            )),
        }
    }

    /// Deletes every cached manifest, returning how many were removed.
    pub fn clear(&self) -> Result<usize, AtipError> {
        let mut removed = 0;
        for path in self.cache_files()? {
            std::fs::remove_file(&path).map_err(|e| {
                AtipError::io(format!("failed to remove cache file '{}'", path.display()), e)
            })?;
            removed += 1;
        }
        Ok(removed)
    }

    pub fn info(&self) -> Result<CacheInfo, AtipError> {
        let files = self.cache_files()?;
        let total_bytes = files
            .iter()
            .filter_map(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        Ok(CacheInfo {
            dir: self.dir.clone(),
            entries: files.len(),
            total_bytes,
        })
    }

    fn cache_files(&self) -> Result<Vec<PathBuf>, AtipError> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AtipError::io(
                    format!("failed to read cache directory '{}'", self.dir.display()),
                    e,
                ));
            }
        };
        Ok(read_dir
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ManifestCache::new(dir.path().join("tools"));
        let manifest = json!({"name": "demo", "version": "1.0.0"});

        let path = cache.write("demo", &manifest).unwrap();
        assert_eq!(path, dir.path().join("tools/demo.json"));
        assert_eq!(cache.read("demo").unwrap(), Some(manifest));
        assert_eq!(cache.read("other").unwrap(), None);
    }

    #[test]
    fn path_traversal_names_are_rejected() {
        let cache = ManifestCache::new("/tmp/atip-tools");
        for bad in ["../etc/passwd", "a/b", ".hidden", ""] {
            assert!(cache.path_for(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn info_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ManifestCache::new(dir.path());
        assert_eq!(cache.info().unwrap().entries, 0);

        cache.write("a", &json!({"name": "a"})).unwrap();
        cache.write("b", &json!({"name": "b"})).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let info = cache.info().unwrap();
        assert_eq!(info.entries, 2);
        assert!(info.total_bytes > 0);

        assert_eq!(cache.clear().unwrap(), 2);
        assert_eq!(cache.info().unwrap().entries, 0);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn remove_reports_whether_file_existed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ManifestCache::new(dir.path());
        cache.write("a", &json!({})).unwrap();
        assert!(cache.remove("a").unwrap());
        assert!(!cache.remove("a").unwrap());
    }

    #[test]
    fn missing_cache_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ManifestCache::new(dir.path().join("never-created"));
        assert_eq!(cache.info().unwrap().entries, 0);
        assert_eq!(cache.clear().unwrap(), 0);
    }
}
