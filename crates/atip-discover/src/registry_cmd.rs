// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `list`, `get`, and `remove`: read and edit the registry without probing.

use atip_config::AtipConfig;
use atip_core::{AtipError, ToolSource};
use atip_registry::{ManifestCache, RegistryStore, is_stale};
use clap::Args;
use tracing::info;

use crate::output::{Report, ToolRow};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show tools whose name matches this glob.
    pub pattern: Option<String>,

    /// Only show tools from this source (native or shim).
    #[arg(long)]
    pub source: Option<ToolSource>,

    /// Only show tools whose executable changed or disappeared since the last probe.
    #[arg(long)]
    pub stale: bool,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub name: String,

    /// Include the cached manifest.
    #[arg(long)]
    pub manifest: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub name: String,
}

pub fn run_list(args: &ListArgs, config: &AtipConfig) -> Result<Report, AtipError> {
    let store = RegistryStore::load(config.data_paths().registry_file)?;
    let tools = store
        .list(args.pattern.as_deref(), args.source)?
        .into_iter()
        .map(|entry| ToolRow {
            stale: is_stale(entry),
            entry: entry.clone(),
        })
        .filter(|row| !args.stale || row.stale)
        .collect();
    Ok(Report::List { tools })
}

pub fn run_get(args: &GetArgs, config: &AtipConfig) -> Result<Report, AtipError> {
    let paths = config.data_paths();
    let store = RegistryStore::load(&paths.registry_file)?;
    let entry = store.get(&args.name)?;

    let manifest = if args.manifest {
        ManifestCache::new(&paths.tools_dir).read(&entry.name)?
    } else {
        None
    };

    Ok(Report::Tool {
        tool: ToolRow {
            stale: is_stale(entry),
            entry: entry.clone(),
        },
        manifest,
    })
}

pub fn run_remove(args: &RemoveArgs, config: &AtipConfig) -> Result<Report, AtipError> {
    let paths = config.data_paths();
    let mut store = RegistryStore::load(&paths.registry_file)?;
    let removed = store.remove(&args.name)?;
    let cache_removed = ManifestCache::new(&paths.tools_dir).remove(&removed.name)?;
    store.save()?;

    info!(tool = %removed.name, cache_removed, "tool removed");
    Ok(Report::Removed {
        name: removed.name,
        cache_removed,
    })
}

#[cfg(test)]
mod tests {
    use atip_core::RegistryEntry;
    use serde_json::json;

    use super::*;

    fn config_for(dir: &std::path::Path) -> AtipConfig {
        let mut config = AtipConfig::default();
        config.storage.data_dir = dir.to_string_lossy().into_owned();
        config
    }

    fn seed(config: &AtipConfig) {
        let paths = config.data_paths();
        let mut store = RegistryStore::empty(&paths.registry_file);
        store.add(RegistryEntry::native("gh", "2.40.0", "/nonexistent/gh", None));
        store.add(RegistryEntry::native("git", "2.43.0", "/nonexistent/git", None));
        store.add(RegistryEntry::shim("curl", "8.0.0", "/shims/curl.json"));
        store.save().unwrap();
        ManifestCache::new(&paths.tools_dir)
            .write("gh", &json!({"name": "gh"}))
            .unwrap();
    }

    #[test]
    fn list_filters_by_pattern_and_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        seed(&config);

        let args = ListArgs {
            pattern: Some("g*".into()),
            source: None,
            stale: false,
        };
        let Report::List { tools } = run_list(&args, &config).unwrap() else {
            panic!("expected list");
        };
        let names: Vec<_> = tools.iter().map(|t| t.entry.name.as_str()).collect();
        assert_eq!(names, vec!["gh", "git"]);

        let args = ListArgs {
            pattern: None,
            source: Some(ToolSource::Shim),
            stale: false,
        };
        let Report::List { tools } = run_list(&args, &config).unwrap() else {
            panic!("expected list");
        };
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].entry.name, "curl");
        assert!(!tools[0].stale);
    }

    #[test]
    fn list_stale_excludes_shims() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        seed(&config);

        let args = ListArgs {
            pattern: None,
            source: None,
            stale: true,
        };
        let Report::List { tools } = run_list(&args, &config).unwrap() else {
            panic!("expected list");
        };
        // Native entries point at missing executables.
        let names: Vec<_> = tools.iter().map(|t| t.entry.name.as_str()).collect();
        assert_eq!(names, vec!["gh", "git"]);
    }

    #[test]
    fn get_with_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        seed(&config);

        let args = GetArgs {
            name: "gh".into(),
            manifest: true,
        };
        let Report::Tool { tool, manifest } = run_get(&args, &config).unwrap() else {
            panic!("expected tool");
        };
        assert_eq!(tool.entry.version, "2.40.0");
        assert_eq!(manifest.unwrap()["name"], "gh");
    }

    #[test]
    fn get_unknown_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let args = GetArgs {
            name: "missing".into(),
            manifest: false,
        };
        assert!(matches!(
            run_get(&args, &config),
            Err(AtipError::NotFound { .. })
        ));
    }

    #[test]
    fn remove_deletes_entry_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        seed(&config);

        let report = run_remove(&RemoveArgs { name: "gh".into() }, &config).unwrap();
        assert!(matches!(
            report,
            Report::Removed {
                cache_removed: true,
                ..
            }
        ));

        let paths = config.data_paths();
        let store = RegistryStore::load(&paths.registry_file).unwrap();
        assert!(store.get("gh").is_err());
        assert_eq!(store.len(), 2);
        assert!(ManifestCache::new(&paths.tools_dir).read("gh").unwrap().is_none());
    }
}
