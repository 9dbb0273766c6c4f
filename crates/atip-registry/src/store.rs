// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-file registry of discovered tools.
//!
//! [`RegistryStore`] owns the in-memory [`Registry`] and is the only writer of
//! its backing file. Mutations happen in memory; [`RegistryStore::save`]
//! persists the whole document with an atomic replace.

use std::path::{Path, PathBuf};

use atip_core::{AtipError, RegistryEntry, ToolSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atomic::write_atomic;

/// Schema version written into every registry file.
pub const REGISTRY_SCHEMA_VERSION: &str = "1";

/// The persisted registry document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tools: Vec<RegistryEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            version: REGISTRY_SCHEMA_VERSION.to_string(),
            last_scan: None,
            tools: Vec::new(),
        }
    }
}

/// Whether an upsert inserted a new entry or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
}

/// Loads a registry file. A missing file yields an empty registry.
pub fn load_registry(path: &Path) -> Result<Registry, AtipError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no registry file, starting empty");
            return Ok(Registry::default());
        }
        Err(e) => {
            return Err(AtipError::registry(
                format!("failed to read registry '{}'", path.display()),
                e,
            ));
        }
    };

    serde_json::from_str(&content).map_err(|e| {
        AtipError::registry(format!("malformed registry '{}'", path.display()), e)
    })
}

/// Serializes and atomically writes a registry file.
pub fn save_registry(registry: &Registry, path: &Path) -> Result<(), AtipError> {
    let json = serde_json::to_vec_pretty(registry)
        .map_err(|e| AtipError::registry("failed to serialize registry", e))?;
    write_atomic(path, &json).map_err(|e| {
        AtipError::registry(format!("failed to write registry '{}'", path.display()), e)
    })
}

/// Reads a file's modification time.
pub fn file_mod_time(path: &Path) -> std::io::Result<DateTime<Utc>> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}

/// Compares two timestamps, ignoring sub-millisecond differences introduced
/// by filesystem or serialization precision.
pub fn same_instant(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp_millis() == b.timestamp_millis()
}

/// Whether the executable behind an entry changed since it was recorded.
///
/// Native entries are stale when the file is gone or its modification time is
/// strictly after the recorded one. Shim entries are never stale.
pub fn is_stale(entry: &RegistryEntry) -> bool {
    if entry.source == ToolSource::Shim {
        return false;
    }
    match file_mod_time(&entry.path) {
        Err(_) => true,
        Ok(current) => match entry.mod_time {
            None => true,
            Some(recorded) => current.timestamp_millis() > recorded.timestamp_millis(),
        },
    }
}

/// Durable store of discovered tools keyed by name.
pub struct RegistryStore {
    path: PathBuf,
    registry: Registry,
}

impl RegistryStore {
    /// Loads the store from `path`, or starts empty if the file does not exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AtipError> {
        let path = path.into();
        let registry = load_registry(&path)?;
        Ok(Self { path, registry })
    }

    /// Creates an empty store bound to `path` without touching the disk.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            registry: Registry::default(),
        }
    }

    /// Persists the current state atomically.
    pub fn save(&self) -> Result<(), AtipError> {
        save_registry(&self.registry, &self.path)?;
        debug!(
            path = %self.path.display(),
            tools = self.registry.tools.len(),
            "registry saved"
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        self.registry.last_scan
    }

    pub fn set_last_scan(&mut self, at: DateTime<Utc>) {
        self.registry.last_scan = Some(at);
    }

    /// Inserts or updates an entry by name.
    ///
    /// An existing entry keeps its `discovered_at` unless the caller set one;
    /// version, path, source, last_verified, and mod_time are overwritten. Unset
    /// timestamps on a new entry default to now.
    pub fn add(&mut self, mut entry: RegistryEntry) -> Upsert {
        let now = Utc::now();
        if entry.last_verified.is_none() {
            entry.last_verified = Some(now);
        }

        match self.registry.tools.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => {
                existing.version = entry.version;
                existing.path = entry.path;
                existing.source = entry.source;
                existing.last_verified = entry.last_verified;
                existing.mod_time = entry.mod_time;
                if entry.discovered_at.is_some() {
                    existing.discovered_at = entry.discovered_at;
                } else if existing.discovered_at.is_none() {
                    existing.discovered_at = Some(now);
                }
                Upsert::Updated
            }
            None => {
                if entry.discovered_at.is_none() {
                    entry.discovered_at = Some(now);
                }
                self.registry.tools.push(entry);
                Upsert::Added
            }
        }
    }

    /// Removes an entry by name, returning it.
    pub fn remove(&mut self, name: &str) -> Result<RegistryEntry, AtipError> {
        let index = self
            .registry
            .tools
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| AtipError::NotFound {
                name: name.to_string(),
            })?;
        Ok(self.registry.tools.remove(index))
    }

    /// Removes every entry and forgets the last scan time.
    pub fn clear(&mut self) -> usize {
        let removed = self.registry.tools.len();
        self.registry.tools.clear();
        self.registry.last_scan = None;
        removed
    }

    pub fn get(&self, name: &str) -> Result<&RegistryEntry, AtipError> {
        self.registry
            .tools
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| AtipError::NotFound {
                name: name.to_string(),
            })
    }

    /// Finds the entry recorded for an executable path.
    pub fn find_by_path(&self, path: &Path) -> Option<&RegistryEntry> {
        self.registry.tools.iter().find(|e| e.path == path)
    }

    /// Lists entries sorted by name, filtered by an optional glob on the name
    /// and an optional exact source.
    pub fn list(
        &self,
        pattern: Option<&str>,
        source: Option<ToolSource>,
    ) -> Result<Vec<&RegistryEntry>, AtipError> {
        let pattern = pattern
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| AtipError::Config(format!("invalid name pattern '{p}': {e}")))
            })
            .transpose()?;

        let mut entries: Vec<&RegistryEntry> = self
            .registry
            .tools
            .iter()
            .filter(|e| source.is_none_or(|s| e.source == s))
            .filter(|e| pattern.as_ref().is_none_or(|p| p.matches(&e.name)))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Entries whose backing executable changed or disappeared.
    pub fn stale_entries(&self) -> Vec<&RegistryEntry> {
        let mut stale: Vec<&RegistryEntry> =
            self.registry.tools.iter().filter(|e| is_stale(e)).collect();
        stale.sort_by(|a, b| a.name.cmp(&b.name));
        stale
    }

    /// True if a native entry exists for `path` with the given mod time.
    pub fn is_unchanged(&self, path: &Path, mod_time: DateTime<Utc>) -> bool {
        self.find_by_path(path)
            .and_then(|e| e.mod_time)
            .is_some_and(|recorded| same_instant(recorded, mod_time))
    }

    pub fn len(&self) -> usize {
        self.registry.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.tools.is_empty()
    }
}
