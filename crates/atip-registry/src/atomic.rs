// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-temp-then-rename file replacement.

use std::io::Write;
use std::path::Path;

/// Atomically replaces `path` with `contents`.
///
/// The bytes go to a temporary file in the same directory, are synced, and
/// the temporary file is renamed over the target. Readers see either the old
/// file or the new one, never a partial write. If the rename fails the
/// temporary file is deleted before the error is returned.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "atip".to_string());

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    // On failure `PersistError` hands back the temp file; dropping it unlinks it.
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
