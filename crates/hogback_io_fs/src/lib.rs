//! `hogback_io_fs` v1:
//! Directory copy and backup-set engine.
//!
//! Modules:
//! - `list`       : one-level directory listing
//! - `copy`       : single-file copy and directory copy orchestration
//! - `verify`     : post-copy content comparison
//! - `backup_set` : set naming, listing, pruning, validation
//! - `backup`     : one full backup run
//! - `spec`       : enums/options/errors
//! - `report`     : run-time report model
//! - `util`       : shared helper functions

pub mod backup;
pub mod backup_set;
pub mod copy;
pub mod list;
pub mod report;
pub mod spec;
mod util;
pub mod verify;

pub use backup::{backup, backup_with_clock};
pub use backup_set::{
    create_empty_set, derive_set_name, list_backup_sets, parse_set_name, prune_backup_sets,
    validate_backup_sets,
};
pub use copy::{copy_dir, copy_file, copy_file_with_options};
pub use list::{list_directory, sort_entries};
pub use report::{ReportBackup, ReportCopy, ReportCopyBuilder, ReportPrune, ReportVerify};
pub use spec::{
    BackupError, CopyError, EnumCopyErrorKind, EnumCopyTransferMode, EnumCopyWriteMode,
    EnumEntryKind, SpecBackupIssue, SpecBackupOptions, SpecBackupSet, SpecCopyError,
    SpecCopyOptions, SpecCopyTask, SpecDirEntry,
};
pub use verify::{files_match, verify_tree};
