// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for atip-discover.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::ValidationIssue;

/// The primary error type shared by the registry, prober, and scanner.
#[derive(Debug, Error)]
pub enum AtipError {
    /// Configuration errors (malformed skip pattern, bad option values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Registry load/save failures. These abort a scan.
    #[error("registry error: {message}")]
    Registry {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Filesystem errors outside the registry file (cache, shims).
    #[error("i/o error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },

    /// A named tool does not exist in the registry.
    #[error("tool not found: {name}")]
    NotFound { name: String },

    /// The candidate could not be executed at all.
    #[error("failed to probe {}: {message}", path.display())]
    Probe { path: PathBuf, message: String },

    /// The candidate claims protocol support but its output is unusable.
    #[error("protocol violation from {}: {message}", path.display())]
    Protocol { path: PathBuf, message: String },

    /// The candidate emitted JSON that does not conform to the manifest schema.
    #[error("invalid manifest from {}: {}", path.display(), summarize(errors))]
    Validation {
        path: PathBuf,
        errors: Vec<ValidationIssue>,
    },

    /// A probe exceeded its deadline and the subprocess was killed.
    #[error("probe of {} timed out after {duration:?}", path.display())]
    Timeout { path: PathBuf, duration: Duration },

    /// The scan was cancelled before this operation completed.
    #[error("scan cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AtipError {
    /// Convenience constructor for registry failures with an underlying cause.
    pub fn registry(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AtipError::Registry {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Convenience constructor for non-registry filesystem failures.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        AtipError::Io {
            message: message.into(),
            source,
        }
    }
}

fn summarize(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ValidationIssue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
