//! One backup run: new set, optional pruning, copy, optional verification.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::backup_set::{create_empty_set, prune_backup_sets};
use crate::copy::{copy_dir, validate_source_dir};
use crate::report::ReportBackup;
use crate::spec::{BackupError, SpecBackupOptions};
use crate::util::is_overlap;
use crate::verify::verify_tree;

/// Back up `dir_source` into a fresh set under `backup_root`.
///
/// With a space budget, old sets are pruned once before the copy to make
/// room and once after it, when the size of the new set is known. The new
/// set itself is never pruned, so a run whose own copy exceeds the budget
/// leaves the root over it.
pub fn backup<P, Q>(
    dir_source: P,
    backup_root: Q,
    spec_bk_options: SpecBackupOptions,
) -> Result<ReportBackup, BackupError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    backup_with_clock(dir_source, backup_root, spec_bk_options, Utc::now)
}

/// [`backup`] with an injected clock for set naming.
pub fn backup_with_clock<P, Q, F>(
    dir_source: P,
    backup_root: Q,
    spec_bk_options: SpecBackupOptions,
    now_fn: F,
) -> Result<ReportBackup, BackupError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    F: Fn() -> DateTime<Utc>,
{
    let path_dir_src = dir_source.as_ref();
    let path_root = backup_root.as_ref();

    // Nothing under the root is created until the source checks out.
    validate_source_dir(path_dir_src)?;
    if is_overlap(path_dir_src, path_root) {
        return Err(BackupError::SourceDestinationOverlap {
            path_src: path_dir_src.to_path_buf(),
            path_dst: path_root.to_path_buf(),
        });
    }

    fs::create_dir_all(path_root).map_err(|e| BackupError::DestinationInitFailed {
        path: path_root.to_path_buf(),
        message: e.to_string(),
    })?;
    let name_set = create_empty_set(path_root, now_fn)?;
    let path_set = path_root.join(&name_set);

    let mut report_prune = match spec_bk_options.n_bytes_max {
        Some(n_bytes_max) => Some(prune_backup_sets(path_root, n_bytes_max, Some(&name_set))?),
        None => None,
    };

    log::info!(
        "backing up {} into {}",
        path_dir_src.display(),
        path_set.display()
    );
    let report_copy = copy_dir(
        path_dir_src,
        &path_set,
        spec_bk_options.spec_cp_options.clone(),
    )?;
    log::info!("{report_copy}");

    if let (Some(n_bytes_max), Some(report_prune)) =
        (spec_bk_options.n_bytes_max, report_prune.as_mut())
    {
        report_prune.merge(prune_backup_sets(path_root, n_bytes_max, Some(&name_set))?);
    }

    let report_verify = if spec_bk_options.if_verify && !spec_bk_options.spec_cp_options.if_dry_run
    {
        Some(verify_tree(
            path_dir_src,
            &path_set,
            &spec_bk_options.spec_cp_options,
        )?)
    } else {
        None
    };

    Ok(ReportBackup {
        name_set,
        path_set,
        report_copy,
        report_prune,
        report_verify,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use chrono::{DateTime, TimeZone, Utc};

    use super::{backup, backup_with_clock};
    use crate::backup_set::list_backup_sets;
    use crate::spec::{BackupError, SpecBackupOptions};

    const DEEP_PATH: &str = "thats/deep";
    const THE_TEXT: &str = "backmeup susie";

    fn create_source(path_root: &Path) -> std::path::PathBuf {
        let path_src = path_root.join("orig");
        fs::create_dir_all(path_src.join(DEEP_PATH)).expect("mkdir");
        fs::write(path_src.join(DEEP_PATH).join("testfile.txt"), THE_TEXT).expect("write");
        path_src
    }

    fn time_fixer(n_secs: i64) -> impl Fn() -> DateTime<Utc> {
        let fixed_time = Utc.timestamp_opt(n_secs, 0).single().expect("valid time");
        move || fixed_time
    }

    #[test]
    fn backup_copies_deep_file_into_new_set() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = create_source(tmp.path());
        let root = tmp.path().join("backups");

        let report = backup(&src, &root, SpecBackupOptions::default()).expect("backup");
        assert!(report.is_success());
        assert!(report.name_set.starts_with("dhb-set-"));
        let path_file = root
            .join(&report.name_set)
            .join(DEEP_PATH)
            .join("testfile.txt");
        assert_eq!(fs::read_to_string(path_file).expect("read"), THE_TEXT);
    }

    #[test]
    fn backup_creates_missing_destination_root() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = create_source(tmp.path());
        let root = tmp.path().join("to-be-created/backups");

        backup(&src, &root, SpecBackupOptions::default()).expect("backup");
        assert_eq!(fs::read_dir(&root).expect("read root").count(), 1);
    }

    #[test]
    fn backup_missing_source_leaves_root_untouched() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("backups");

        let err = backup(tmp.path().join("missing"), &root, SpecBackupOptions::default())
            .expect_err("must fail");
        assert!(matches!(err, BackupError::SourceNotFound(_)));
        assert!(!root.exists());
    }

    #[test]
    fn backup_root_inside_source_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = create_source(tmp.path());

        let err = backup(&src, src.join("backups"), SpecBackupOptions::default())
            .expect_err("must fail");
        assert!(matches!(err, BackupError::SourceDestinationOverlap { .. }));
        assert!(!src.join("backups").exists());
    }

    #[test]
    fn backup_with_verify_and_budget_prunes_old_sets() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = create_source(tmp.path());
        let root = tmp.path().join("backups");

        let spec_bk_options = SpecBackupOptions {
            // Any previous set pushes the root over budget.
            n_bytes_max: Some(1),
            if_verify: true,
            ..SpecBackupOptions::default()
        };
        let report_first =
            backup_with_clock(&src, &root, spec_bk_options.clone(), time_fixer(1_000))
                .expect("first");
        let report_second =
            backup_with_clock(&src, &root, spec_bk_options, time_fixer(2_000)).expect("second");

        assert!(report_first.is_success());
        assert!(report_second.is_success());
        let report_verify = report_second.report_verify.expect("verify ran");
        assert_eq!(report_verify.cnt_checked, 1);
        let report_prune = report_second.report_prune.expect("prune ran");
        assert_eq!(report_prune.removed, [report_first.path_set.clone()]);

        let l_sets = list_backup_sets(&root).expect("list");
        assert_eq!(l_sets.len(), 1);
        assert_eq!(l_sets[0].name, report_second.name_set);
    }

    #[test]
    fn backup_prunes_again_once_new_set_is_filled() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = create_source(tmp.path());
        let root = tmp.path().join("backups");

        // One set fits, two do not.
        let spec_bk_options = SpecBackupOptions {
            n_bytes_max: Some(THE_TEXT.len() as u64 + 6),
            ..SpecBackupOptions::default()
        };
        let report_first =
            backup_with_clock(&src, &root, spec_bk_options.clone(), time_fixer(1_000))
                .expect("first");
        assert!(report_first.report_prune.expect("prune ran").removed.is_empty());

        let report_second =
            backup_with_clock(&src, &root, spec_bk_options, time_fixer(2_000)).expect("second");
        let report_prune = report_second.report_prune.expect("prune ran");
        assert_eq!(report_prune.removed, [report_first.path_set.clone()]);
        assert_eq!(report_prune.n_bytes_after, THE_TEXT.len() as u64);

        let l_sets = list_backup_sets(&root).expect("list");
        assert_eq!(l_sets.len(), 1);
        assert_eq!(l_sets[0].name, report_second.name_set);
    }
}
