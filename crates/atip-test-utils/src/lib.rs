// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for atip-discover.
//!
//! - [`MockTool`] writes real executables (shell scripts) for end-to-end probing
//! - [`MockProber`] answers probes from memory for scanner tests

pub mod mock_prober;
pub mod mock_tool;

pub use mock_prober::{MockProber, MockResponse};
pub use mock_tool::{MockTool, demo_manifest, read_calls};
