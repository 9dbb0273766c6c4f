// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory gating and skip-list matching.
//!
//! A directory is only enumerated when it exists, is not the current working
//! directory, and (on Unix) is neither world-writable nor owned by another
//! non-root user. Rejections are expected and never abort a scan.

use std::path::Path;

use atip_core::AtipError;
use thiserror::Error;

/// Why a directory was refused.
#[derive(Debug, Error)]
pub enum UnsafePath {
    #[error("current directory not allowed")]
    CurrentDirectory,

    #[error("cannot stat directory: {0}")]
    Inaccessible(#[from] std::io::Error),

    #[error("not a directory")]
    NotDirectory,

    #[error("world-writable")]
    WorldWritable,

    #[error("owned by other user (uid {owner})")]
    OwnedByOtherUser { owner: u32 },
}

/// Decides whether `path` may be enumerated for executables.
pub fn is_safe_path(path: &Path) -> Result<(), UnsafePath> {
    if path.as_os_str().is_empty() || path == Path::new(".") {
        return Err(UnsafePath::CurrentDirectory);
    }

    let metadata = std::fs::metadata(path)?;
    if !metadata.is_dir() {
        return Err(UnsafePath::NotDirectory);
    }

    if is_current_dir(path) {
        return Err(UnsafePath::CurrentDirectory);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        evaluate_unix_permissions(metadata.mode(), metadata.uid(), current_uid())?;
    }

    Ok(())
}

fn is_current_dir(path: &Path) -> bool {
    let Ok(cwd) = std::env::current_dir().and_then(|d| d.canonicalize()) else {
        return false;
    };
    path.canonicalize().is_ok_and(|p| p == cwd)
}

#[cfg(unix)]
fn current_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

/// Ownership and permission rules for a Unix directory.
///
/// Root-owned and self-owned directories pass unless any "other" write bit
/// is set.
#[cfg(unix)]
pub fn evaluate_unix_permissions(mode: u32, owner: u32, current: u32) -> Result<(), UnsafePath> {
    if mode & 0o002 != 0 {
        return Err(UnsafePath::WorldWritable);
    }
    if owner != 0 && owner != current {
        return Err(UnsafePath::OwnedByOtherUser { owner });
    }
    Ok(())
}

/// Compiled skip-list patterns.
///
/// A name is skipped when it equals a pattern or matches it as a shell glob.
#[derive(Debug, Clone, Default)]
pub struct SkipList {
    entries: Vec<(String, glob::Pattern)>,
}

impl SkipList {
    /// Compiles every pattern; the first malformed one is a config error.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, AtipError> {
        let entries = patterns
            .iter()
            .map(|p| {
                let raw = p.as_ref();
                glob::Pattern::new(raw)
                    .map(|compiled| (raw.to_string(), compiled))
                    .map_err(|e| {
                        AtipError::Config(format!("invalid skip-list pattern `{raw}`: {e}"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Returns true if `name` is skip-listed.
    pub fn matches(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|(raw, pattern)| raw == name || pattern.matches(name))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_list_exact_and_glob() {
        let list = SkipList::new(&["curl"]).unwrap();
        assert!(list.matches("curl"));
        assert!(!list.matches("wget"));

        let list = SkipList::new(&["curl*"]).unwrap();
        assert!(list.matches("curl-dev"));
        assert!(list.matches("curl"));
    }

    #[test]
    fn skip_list_question_mark_and_class() {
        let list = SkipList::new(&["test?", "mkfs.[ex]*"]).unwrap();
        assert!(list.matches("test1"));
        assert!(!list.matches("test12"));
        assert!(list.matches("mkfs.ext4"));
        assert!(!list.matches("mkfs.btrfs"));
    }

    #[test]
    fn malformed_pattern_is_config_error() {
        let err = SkipList::new(&["[oops"]).unwrap_err();
        assert!(matches!(err, AtipError::Config(_)));
        assert!(err.to_string().contains("[oops"));
    }

    #[test]
    fn empty_skip_list_matches_nothing() {
        let list = SkipList::new::<&str>(&[]).unwrap();
        assert!(list.is_empty());
        assert!(!list.matches("anything"));
    }

    #[test]
    fn empty_and_dot_paths_rejected() {
        assert!(matches!(
            is_safe_path(Path::new("")),
            Err(UnsafePath::CurrentDirectory)
        ));
        assert!(matches!(
            is_safe_path(Path::new(".")),
            Err(UnsafePath::CurrentDirectory)
        ));
    }

    #[test]
    fn missing_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = is_safe_path(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, UnsafePath::Inaccessible(_)));
    }

    #[test]
    fn regular_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"").unwrap();
        assert!(matches!(is_safe_path(&file), Err(UnsafePath::NotDirectory)));
    }

    #[cfg(unix)]
    #[test]
    fn own_directory_accepted() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_safe_path(dir.path()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn world_writable_directory_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o777)).unwrap();
        let err = is_safe_path(dir.path()).unwrap_err();
        assert!(matches!(err, UnsafePath::WorldWritable));
        assert_eq!(err.to_string(), "world-writable");
    }

    #[cfg(unix)]
    #[test]
    fn ownership_rules() {
        assert!(evaluate_unix_permissions(0o755, 1000, 1000).is_ok());
        assert!(evaluate_unix_permissions(0o755, 0, 1000).is_ok());
        assert!(matches!(
            evaluate_unix_permissions(0o755, 1001, 1000),
            Err(UnsafePath::OwnedByOtherUser { owner: 1001 })
        ));
        assert!(matches!(
            evaluate_unix_permissions(0o1777, 0, 1000),
            Err(UnsafePath::WorldWritable)
        ));
    }
}
