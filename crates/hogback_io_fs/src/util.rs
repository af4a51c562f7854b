use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::spec::{BackupError, CopyError};

/// Prefix of temporary files written by atomic copies.
pub(crate) const C_PREFIX_PARTIAL: &str = ".hogback-partial-";

/// Internal buffer size for reader/writer pairs.
pub(crate) const N_BYTES_BUFFER: usize = 64 * 1024;

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone, Default)]
pub(crate) struct SpecExcludePatterns {
    glob_set: Option<GlobSet>,
}

impl SpecExcludePatterns {
    pub(crate) fn from_raw(patterns_exclude: Option<&[String]>) -> Result<Self, BackupError> {
        let Some(patterns) = patterns_exclude else {
            return Ok(Self::default());
        };
        if patterns.is_empty() {
            return Ok(Self::default());
        }

        let mut builder_glob = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| BackupError::InvalidPattern(format!("`{pattern}` ({e})")))?;
            builder_glob.add(glob);
        }
        let glob_set = builder_glob
            .build()
            .map_err(|e| BackupError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            glob_set: Some(glob_set),
        })
    }

    pub(crate) fn is_excluded(&self, name_entry: &str) -> bool {
        self.glob_set
            .as_ref()
            .is_some_and(|glob_set| glob_set.is_match(name_entry))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    // Destination may not exist yet: resolve the nearest existing ancestor.
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name())
        && !parent.as_os_str().is_empty()
    {
        return _normalize_path(parent).join(name);
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

/// `true` when one directory contains the other (or they are the same).
pub(crate) fn is_overlap(src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(src);
    let dst_resolved = _normalize_path(dst);
    dst_resolved.starts_with(&src_resolved) || src_resolved.starts_with(&dst_resolved)
}

pub(crate) fn is_partial_file_name(name_entry: &str) -> bool {
    name_entry.starts_with(C_PREFIX_PARTIAL)
}

/// Total bytes and count of regular files below `path_dir` (symlinks not followed).
pub(crate) fn calculate_dir_stats(path_dir: &Path) -> Result<(u64, u64), CopyError> {
    let mut n_bytes = 0;
    let mut cnt_files = 0;
    let iter_entries = fs::read_dir(path_dir).map_err(|e| CopyError::from_io(path_dir, e))?;
    for entry_res in iter_entries {
        let entry = entry_res.map_err(|e| CopyError::from_io(path_dir, e))?;
        let path_entry = entry.path();
        let meta_entry =
            fs::symlink_metadata(&path_entry).map_err(|e| CopyError::from_io(&path_entry, e))?;
        if meta_entry.is_file() {
            n_bytes += meta_entry.len();
            cnt_files += 1;
        } else if meta_entry.is_dir() {
            let (n_bytes_sub, cnt_files_sub) = calculate_dir_stats(&path_entry)?;
            n_bytes += n_bytes_sub;
            cnt_files += cnt_files_sub;
        }
    }
    Ok((n_bytes, cnt_files))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_patterns_match_names() {
        let patterns = vec!["*.tmp".to_string(), "cache".to_string()];
        let spec_patterns = SpecExcludePatterns::from_raw(Some(patterns.as_slice())).expect("patterns");
        assert!(spec_patterns.is_excluded("a.tmp"));
        assert!(spec_patterns.is_excluded("cache"));
        assert!(!spec_patterns.is_excluded("a.txt"));
    }

    #[test]
    fn empty_exclude_list_matches_nothing() {
        let spec_patterns = SpecExcludePatterns::from_raw(Some(&[][..])).expect("patterns");
        assert!(!spec_patterns.is_excluded("anything"));
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let patterns = vec!["[".to_string()];
        let err = SpecExcludePatterns::from_raw(Some(patterns.as_slice())).expect_err("must fail");
        assert!(matches!(err, BackupError::InvalidPattern(_)));
    }

    #[test]
    fn overlap_detects_nested_missing_destination() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).expect("mkdir");
        assert!(is_overlap(&src, &src.join("not/yet/there")));
        assert!(is_overlap(&src, &src));
        assert!(!is_overlap(&src, &tmp.path().join("dst")));
    }

    #[test]
    fn dir_stats_sum_nested_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(tmp.path().join("a/b")).expect("mkdir");
        fs::write(tmp.path().join("x.bin"), [0u8; 10]).expect("write");
        fs::write(tmp.path().join("a/b/y.bin"), [0u8; 5]).expect("write");
        let (n_bytes, cnt_files) = calculate_dir_stats(tmp.path()).expect("stats");
        assert_eq!(n_bytes, 15);
        assert_eq!(cnt_files, 2);
    }
}
