//! Copy/backup specification models and top-level error types.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Entry kind as reported by the filesystem (symlinks are not followed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumEntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Anything else: symlink, socket, fifo, device.
    Other,
}

/// How destination bytes are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyWriteMode {
    /// Create or truncate the destination and write into it directly.
    InPlace,
    /// Write into a temporary sibling file and rename it over the destination.
    AtomicRename,
}

/// How a file's content reaches the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyTransferMode {
    /// Always copy bytes.
    Copy,
    /// Try a hard link first, fall back to copying bytes.
    HardLinkOrCopy,
}

/// Classification of a per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyErrorKind {
    /// Path does not exist.
    NotFound,
    /// Access refused.
    PermissionDenied,
    /// Any other filesystem fault.
    Io,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region EntriesAndTasks

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDirEntry {
    /// Entry name for display and pattern matching (lossy for non-UTF-8 names).
    pub name: String,
    /// Entry name exactly as stored on disk.
    pub file_name: OsString,
    /// Entry kind.
    pub kind: EnumEntryKind,
    /// Full path (`listed_dir.join(name)`).
    pub path: PathBuf,
}

/// Source/destination pairing for one file copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCopyTask {
    pub path_src: PathBuf,
    pub path_dst: PathBuf,
}

impl SpecCopyTask {
    /// Pair a listed entry with its counterpart under `path_dir_dst`.
    pub fn from_entry(spec_entry: &SpecDirEntry, path_dir_dst: &Path) -> Self {
        Self {
            path_src: spec_entry.path.clone(),
            path_dst: path_dir_dst.join(&spec_entry.file_name),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Input options for [`crate::copy::copy_dir`].
#[derive(Debug, Clone)]
pub struct SpecCopyOptions {
    /// Recurse into subdirectories. When `false` they are skipped with a warning.
    pub if_recursive: bool,
    /// Destination commit strategy.
    pub rule_write: EnumCopyWriteMode,
    /// Hard-link vs byte copy.
    pub rule_transfer: EnumCopyTransferMode,
    /// Glob patterns matched against entry names; matches are skipped.
    pub patterns_exclude: Option<Vec<String>>,
    /// Do not mutate filesystem; record what would happen.
    pub if_dry_run: bool,
}

impl Default for SpecCopyOptions {
    fn default() -> Self {
        Self {
            if_recursive: true,
            rule_write: EnumCopyWriteMode::InPlace,
            rule_transfer: EnumCopyTransferMode::Copy,
            patterns_exclude: None,
            if_dry_run: false,
        }
    }
}

/// Input options for [`crate::backup::backup`].
#[derive(Debug, Clone, Default)]
pub struct SpecBackupOptions {
    /// Options forwarded to the tree copy.
    pub spec_cp_options: SpecCopyOptions,
    /// Space budget for all backup sets under the root, in bytes.
    pub n_bytes_max: Option<u64>,
    /// Compare copied files against their sources after the copy.
    pub if_verify: bool,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BackupSets

/// One recognised backup set under a backup root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBackupSet {
    pub name: String,
    pub path: PathBuf,
    /// Timestamp encoded in the set name.
    pub created: DateTime<Utc>,
    /// Total size of regular files inside the set.
    pub n_bytes: u64,
    /// Number of regular files inside the set.
    pub cnt_files: u64,
}

/// One problem found while validating backup sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBackupIssue {
    pub path: PathBuf,
    pub issue: String,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// One copy failure item with path + error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCopyError {
    /// Failed source or destination path.
    pub path: PathBuf,
    /// Failure class.
    pub kind: EnumCopyErrorKind,
    /// User-facing error text.
    pub exception: String,
}

/// Per-item filesystem failure.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("No such file or directory: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("Permission denied: {}", .path.display())]
    PermissionDenied { path: PathBuf },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CopyError {
    /// Classify an `io::Error` raised while operating on `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn kind(&self) -> EnumCopyErrorKind {
        match self {
            Self::NotFound { .. } => EnumCopyErrorKind::NotFound,
            Self::PermissionDenied { .. } => EnumCopyErrorKind::PermissionDenied,
            Self::Io { .. } => EnumCopyErrorKind::Io,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path } | Self::PermissionDenied { path } | Self::Io { path, .. } => {
                path
            }
        }
    }
}

impl From<&CopyError> for SpecCopyError {
    fn from(err: &CopyError) -> Self {
        Self {
            path: err.path().to_path_buf(),
            kind: err.kind(),
            exception: err.to_string(),
        }
    }
}

/// "Top-level call failed" errors (input validation / setup stage).
#[derive(Debug, Error)]
pub enum BackupError {
    /// Source root does not exist.
    #[error("Source does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// Source path is not a directory.
    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    /// Source and destination overlap (`src` contains `dst` or vice versa).
    #[error(
        "Source and destination directories overlap: {} <-> {}",
        .path_src.display(),
        .path_dst.display()
    )]
    SourceDestinationOverlap {
        /// Normalized source directory.
        path_src: PathBuf,
        /// Normalized destination directory.
        path_dst: PathBuf,
    },
    /// Invalid exclude pattern.
    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(String),
    /// Destination directory initialization failed.
    #[error("Failed to initialize destination {}: {message}", .path.display())]
    DestinationInitFailed {
        /// Destination path that failed initialization.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
    /// A new backup set directory could not be created.
    #[error("Failed to create backup set under {}: {message}", .root.display())]
    SetCreateFailed { root: PathBuf, message: String },
    /// A root directory could not be listed.
    #[error(transparent)]
    List(#[from] CopyError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
