//! Timestamped backup sets under a backup root.
//!
//! A set is a directory named `dhb-set-YYYYMMDD-HHMMSS` (UTC), optionally
//! followed by `-N` when several sets are created within the same second.
//! Directories under the root that do not match this pattern are ignored by
//! listing, pruning and validation.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use filetime::FileTime;
use regex::Regex;

use crate::list::{list_directory, sort_entries};
use crate::report::ReportPrune;
use crate::spec::{
    BackupError, CopyError, EnumEntryKind, SpecBackupIssue, SpecBackupSet, SpecCopyError,
};
use crate::util::{calculate_dir_stats, is_partial_file_name};

/// Name prefix shared by every backup set.
pub const C_PREFIX_SET: &str = "dhb-set-";
const C_FMT_SET_TIME: &str = "%Y%m%d-%H%M%S";
const N_SET_SUFFIX_MAX: u32 = 1000;

static RE_SET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^dhb-set-(\d{8}-\d{6})(?:-(\d+))?$").expect("set name regex is valid")
});

////////////////////////////////////////////////////////////////////////////////
// #region Naming

/// Base set name for `created`.
pub fn derive_set_name(created: DateTime<Utc>) -> String {
    format!("{C_PREFIX_SET}{}", created.format(C_FMT_SET_TIME))
}

fn _parse_set_name_parts(name: &str) -> Option<(DateTime<Utc>, u32)> {
    let caps = RE_SET_NAME.captures(name)?;
    let created = NaiveDateTime::parse_from_str(&caps[1], C_FMT_SET_TIME)
        .ok()?
        .and_utc();
    let n_suffix = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    Some((created, n_suffix))
}

/// Creation time encoded in a set name, or `None` for foreign names.
pub fn parse_set_name(name: &str) -> Option<DateTime<Utc>> {
    _parse_set_name_parts(name).map(|(created, _)| created)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Lifecycle

/// Create a new empty set directory under an existing `backup_root`.
///
/// `now_fn` supplies the timestamp. When a set with the same second exists a
/// numeric suffix is appended. Returns the set name.
pub fn create_empty_set<P, F>(backup_root: P, now_fn: F) -> Result<String, BackupError>
where
    P: AsRef<Path>,
    F: Fn() -> DateTime<Utc>,
{
    let path_root = backup_root.as_ref();
    let name_base = derive_set_name(now_fn());

    for n_suffix in 0..N_SET_SUFFIX_MAX {
        let name_set = if n_suffix == 0 {
            name_base.clone()
        } else {
            format!("{name_base}-{n_suffix}")
        };
        match fs::create_dir(path_root.join(&name_set)) {
            Ok(()) => {
                log::info!("created backup set {name_set}");
                return Ok(name_set);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(BackupError::SetCreateFailed {
                    root: path_root.to_path_buf(),
                    message: e.to_string(),
                });
            }
        }
    }
    Err(BackupError::SetCreateFailed {
        root: path_root.to_path_buf(),
        message: format!("more than {N_SET_SUFFIX_MAX} sets named {name_base}"),
    })
}

/// Recognised sets under `backup_root`, oldest first.
pub fn list_backup_sets<P: AsRef<Path>>(backup_root: P) -> Result<Vec<SpecBackupSet>, BackupError> {
    let path_root = backup_root.as_ref();
    let mut l_sets: Vec<(u32, SpecBackupSet)> = Vec::new();

    for spec_entry in list_directory(path_root)? {
        if spec_entry.kind != EnumEntryKind::Directory {
            continue;
        }
        let Some((created, n_suffix)) = _parse_set_name_parts(&spec_entry.name) else {
            continue;
        };
        let (n_bytes, cnt_files) = calculate_dir_stats(&spec_entry.path).unwrap_or_else(|e| {
            log::warn!("Failed to size backup set {}: {e}", spec_entry.path.display());
            (0, 0)
        });
        l_sets.push((
            n_suffix,
            SpecBackupSet {
                name: spec_entry.name,
                path: spec_entry.path,
                created,
                n_bytes,
                cnt_files,
            },
        ));
    }

    l_sets.sort_by(|a, b| (a.1.created, a.0).cmp(&(b.1.created, b.0)));
    Ok(l_sets.into_iter().map(|(_, spec_set)| spec_set).collect())
}

/// Remove the oldest sets until the recognised sets fit in `n_bytes_max`.
///
/// Age is the set directory's modification time, with set order as the
/// tie-breaker. The set named `name_keep` is never removed. A set that cannot
/// be removed is reported and does not count as freed space.
pub fn prune_backup_sets<P: AsRef<Path>>(
    backup_root: P,
    n_bytes_max: u64,
    name_keep: Option<&str>,
) -> Result<ReportPrune, BackupError> {
    let l_sets = list_backup_sets(backup_root)?;
    let n_bytes_before: u64 = l_sets.iter().map(|s| s.n_bytes).sum();

    let mut l_candidates: Vec<(FileTime, usize, SpecBackupSet)> = l_sets
        .into_iter()
        .enumerate()
        .map(|(n_idx, spec_set)| {
            let time_modified = fs::metadata(&spec_set.path)
                .map(|m| FileTime::from_last_modification_time(&m))
                .unwrap_or_else(|_| FileTime::now());
            (time_modified, n_idx, spec_set)
        })
        .collect();
    l_candidates.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    log::info!(
        "before cleanup: total_size={n_bytes_before}, max_space={n_bytes_max}, sets={}",
        l_candidates.len()
    );

    let mut report_prune = ReportPrune {
        n_bytes_before,
        ..ReportPrune::default()
    };
    let mut n_bytes_current = n_bytes_before;
    for (_, _, spec_set) in l_candidates {
        if n_bytes_current <= n_bytes_max {
            break;
        }
        if name_keep == Some(spec_set.name.as_str()) {
            continue;
        }
        log::info!(
            "removing backup set {} ({} bytes)",
            spec_set.name,
            spec_set.n_bytes
        );
        match fs::remove_dir_all(&spec_set.path) {
            Ok(()) => {
                n_bytes_current -= spec_set.n_bytes;
                report_prune.removed.push(spec_set.path);
            }
            Err(e) => {
                let err = CopyError::from_io(&spec_set.path, e);
                log::error!("Failed to remove {}: {err}", spec_set.path.display());
                report_prune.errors.push(SpecCopyError::from(&err));
            }
        }
    }
    report_prune.n_bytes_after = n_bytes_current;
    log::info!("{report_prune}");
    Ok(report_prune)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Validation

/// Inspect every recognised set and report anything a healthy set should not
/// contain.
pub fn validate_backup_sets<P: AsRef<Path>>(
    backup_root: P,
) -> Result<Vec<SpecBackupIssue>, BackupError> {
    let mut l_root_entries = list_directory(backup_root.as_ref())?;
    sort_entries(&mut l_root_entries);

    let mut l_issues = Vec::new();
    for spec_entry in l_root_entries {
        if parse_set_name(&spec_entry.name).is_none() {
            continue;
        }
        if spec_entry.kind != EnumEntryKind::Directory {
            l_issues.push(SpecBackupIssue {
                path: spec_entry.path,
                issue: "backup set is not a directory".to_string(),
            });
            continue;
        }
        validate_directory(&spec_entry.path, &mut l_issues);
    }
    Ok(l_issues)
}

fn validate_directory(path_dir: &Path, l_issues: &mut Vec<SpecBackupIssue>) {
    let mut l_entries = match list_directory(path_dir) {
        Ok(v) => v,
        Err(e) => {
            l_issues.push(SpecBackupIssue {
                path: path_dir.to_path_buf(),
                issue: format!("unreadable: {e}"),
            });
            return;
        }
    };
    sort_entries(&mut l_entries);

    for spec_entry in l_entries {
        match spec_entry.kind {
            EnumEntryKind::File if is_partial_file_name(&spec_entry.name) => {
                l_issues.push(SpecBackupIssue {
                    path: spec_entry.path,
                    issue: "leftover partial file from an interrupted copy".to_string(),
                });
            }
            EnumEntryKind::File => {}
            EnumEntryKind::Directory => validate_directory(&spec_entry.path, l_issues),
            EnumEntryKind::Other => {
                l_issues.push(SpecBackupIssue {
                    path: spec_entry.path,
                    issue: "special entry (symlink, device or socket)".to_string(),
                });
            }
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
