// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `atip-discover validate FILE...`

use std::path::{Path, PathBuf};

use atip_manifest::validate_metadata;
use clap::Args;
use serde_json::Value;

use crate::output::{FileValidation, Report};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Manifest files to check.
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

/// Checks each file independently; unreadable or malformed files are
/// reported as invalid rather than aborting the run.
pub fn run_validate(args: &ValidateArgs) -> Report {
    Report::Validation {
        files: args.files.iter().map(|p| validate_file(p)).collect(),
    }
}

fn validate_file(path: &Path) -> FileValidation {
    let errors = match std::fs::read_to_string(path) {
        Err(e) => vec![format!("cannot read file: {e}")],
        Ok(text) => match serde_json::from_str::<Value>(&text) {
            Err(e) => vec![format!("invalid JSON: {e}")],
            Ok(doc) => validate_metadata(&doc)
                .errors
                .iter()
                .map(|issue| issue.to_string())
                .collect(),
        },
    };
    FileValidation {
        path: path.to_path_buf(),
        valid: errors.is_empty(),
        errors,
    }
}
