// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lists candidate executables in a single directory.

use std::path::{Path, PathBuf};

/// Non-recursive listing of executable regular files (or symlinks to them),
/// sorted by path. An unreadable directory yields an empty list.
pub fn enumerate_executables(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "cannot read directory");
            return Vec::new();
        }
    };

    let mut found: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_executable(path))
        .collect();
    found.sort();
    found
}

/// Follows symlinks; dangling links and non-regular files are not executable.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
    const EXTENSIONS: &[&str] = &["exe", "bat", "cmd"];

    let has_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)));
    has_ext && std::fs::metadata(path).is_ok_and(|m| m.is_file())
}
