// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `atip-discover cache info|clear`

use atip_config::AtipConfig;
use atip_core::AtipError;
use atip_registry::{ManifestCache, RegistryStore};
use clap::Subcommand;
use tracing::info;

use crate::output::Report;

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show registry and cache statistics.
    Info,
    /// Forget every registered tool and delete all cached manifests.
    Clear,
}

pub fn run_cache(action: &CacheAction, config: &AtipConfig) -> Result<Report, AtipError> {
    let paths = config.data_paths();
    let cache = ManifestCache::new(&paths.tools_dir);

    match action {
        CacheAction::Info => {
            let store = RegistryStore::load(&paths.registry_file)?;
            Ok(Report::CacheInfo {
                cache: cache.info()?,
                registry_file: paths.registry_file.clone(),
                tools: store.len(),
                last_scan: store.last_scan(),
            })
        }
        CacheAction::Clear => {
            // A corrupt registry should not block a reset.
            let mut store = RegistryStore::load(&paths.registry_file)
                .unwrap_or_else(|_| RegistryStore::empty(&paths.registry_file));
            let tools = store.clear();
            let manifests = cache.clear()?;
            store.save()?;
            info!(tools, manifests, "cache cleared");
            Ok(Report::CacheCleared { tools, manifests })
        }
    }
}
