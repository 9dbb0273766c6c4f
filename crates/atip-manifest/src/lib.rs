// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ATIP manifest model and schema validator.
//!
//! A manifest is the JSON document a tool prints when invoked with `--agent`.
//! [`validate_metadata`] checks a parsed document structurally and reports
//! every violation with a dotted path; [`parse_manifest`] validates and then
//! converts into the typed [`Manifest`].

pub mod model;
pub mod validate;

pub use model::{Argument, Command, Effects, Manifest, OptionDef, ProtocolTag};
pub use validate::{
    ValidationReport, is_valid_tool_name, load_manifest, parse_manifest, parse_manifest_str,
    validate_metadata,
};
