// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of ATIP-capable executables.
//!
//! [`Scanner`] ties together directory gating ([`safety`]), enumeration,
//! two-phase probing ([`ProcessProber`]), shim loading, and the registry.

pub mod enumerate;
pub mod probe;
pub mod safety;
pub mod scanner;
pub mod shim;

pub use enumerate::enumerate_executables;
pub use probe::{
    DiscoveredTool, INTROSPECTION_FLAG, ProbeConfig, ProbeOutcome, Prober, ProcessProber,
    USAGE_FLAG,
};
pub use safety::{SkipList, UnsafePath, is_safe_path};
pub use scanner::{DEFAULT_PARALLELISM, ScanOptions, Scanner, resolve_directories};
pub use shim::{Shim, load_shims};
