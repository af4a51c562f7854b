//! One-level directory listing.

use std::fs;
use std::path::Path;

use crate::spec::{CopyError, EnumEntryKind, SpecDirEntry};

/// List the immediate children of `dir` in filesystem order.
///
/// Entry kinds come from the directory entry itself, so a symlink is reported
/// as [`EnumEntryKind::Other`] whatever it points to. Order is not sorted; use
/// [`sort_entries`] when determinism matters.
pub fn list_directory<P: AsRef<Path>>(dir: P) -> Result<Vec<SpecDirEntry>, CopyError> {
    let path_dir = dir.as_ref();
    log::debug!("listing contents of {}", path_dir.display());

    let iter_entries = fs::read_dir(path_dir).map_err(|e| CopyError::from_io(path_dir, e))?;
    let mut l_entries = Vec::new();
    for entry_res in iter_entries {
        let entry = entry_res.map_err(|e| CopyError::from_io(path_dir, e))?;
        let path_entry = entry.path();
        let cfg_file_type = entry
            .file_type()
            .map_err(|e| CopyError::from_io(&path_entry, e))?;

        let kind = if cfg_file_type.is_file() {
            EnumEntryKind::File
        } else if cfg_file_type.is_dir() {
            EnumEntryKind::Directory
        } else {
            EnumEntryKind::Other
        };
        let file_name = entry.file_name();
        l_entries.push(SpecDirEntry {
            name: file_name.to_string_lossy().to_string(),
            file_name,
            kind,
            path: path_entry,
        });
    }
    Ok(l_entries)
}

/// Sort entries by name.
pub fn sort_entries(l_entries: &mut [SpecDirEntry]) {
    l_entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
}
