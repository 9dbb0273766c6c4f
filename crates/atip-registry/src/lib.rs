// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry persistence for atip-discover.
//!
//! - [`RegistryStore`] -- name-keyed tool registry backed by one JSON file,
//!   saved with write-temp-then-rename so readers never see a partial file.
//! - [`ManifestCache`] -- one cached manifest JSON file per discovered tool.

pub mod atomic;
pub mod cache;
pub mod store;

pub use cache::{CacheInfo, ManifestCache};
pub use store::{
    REGISTRY_SCHEMA_VERSION, Registry, RegistryStore, Upsert, file_mod_time, is_stale,
    load_registry, same_instant, save_registry,
};
