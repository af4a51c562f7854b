//! Post-copy content verification.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use crate::copy::validate_source_dir;
use crate::list::{list_directory, sort_entries};
use crate::report::ReportVerify;
use crate::spec::{
    BackupError, CopyError, EnumCopyErrorKind, EnumEntryKind, SpecCopyError, SpecCopyOptions,
};
use crate::util::{N_BYTES_BUFFER, SpecExcludePatterns};

/// Compare every file `copy_dir` would have copied from `dir_source` with its
/// counterpart under `dir_destination`.
///
/// Uses the same recursion and exclude rules as the copy so only copied files
/// are checked. Missing or differing counterparts are reported as mismatches.
pub fn verify_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_cp_options: &SpecCopyOptions,
) -> Result<ReportVerify, BackupError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref();
    validate_source_dir(path_dir_src)?;
    let spec_patterns = SpecExcludePatterns::from_raw(spec_cp_options.patterns_exclude.as_deref())?;

    let mut report_verify = ReportVerify::default();
    verify_directory(
        path_dir_src,
        dir_destination.as_ref(),
        spec_cp_options.if_recursive,
        &spec_patterns,
        &mut report_verify,
    )?;
    log::info!("{report_verify}");
    Ok(report_verify)
}

fn verify_directory(
    path_dir_src: &Path,
    path_dir_dst: &Path,
    if_recursive: bool,
    spec_patterns: &SpecExcludePatterns,
    report_verify: &mut ReportVerify,
) -> Result<(), CopyError> {
    let mut l_entries = list_directory(path_dir_src)?;
    sort_entries(&mut l_entries);

    for spec_entry in l_entries {
        if spec_patterns.is_excluded(&spec_entry.name) {
            continue;
        }
        let path_dst = path_dir_dst.join(&spec_entry.file_name);
        match spec_entry.kind {
            EnumEntryKind::File => {
                report_verify.cnt_checked += 1;
                match files_match(&spec_entry.path, &path_dst) {
                    Ok(true) => {}
                    Ok(false) => {
                        log::warn!("content differs: {}", path_dst.display());
                        report_verify.mismatches.push(SpecCopyError {
                            path: path_dst.clone(),
                            kind: EnumCopyErrorKind::Io,
                            exception: format!(
                                "Content differs from {}",
                                spec_entry.path.display()
                            ),
                        });
                    }
                    Err(e) => {
                        log::warn!("{e}");
                        report_verify.mismatches.push(SpecCopyError::from(&e));
                    }
                }
            }
            EnumEntryKind::Directory if if_recursive => {
                // Unreadable subtrees were already reported by the copy.
                if let Err(e) = verify_directory(
                    &spec_entry.path,
                    &path_dst,
                    if_recursive,
                    spec_patterns,
                    report_verify,
                ) {
                    report_verify.mismatches.push(SpecCopyError::from(&e));
                }
            }
            EnumEntryKind::Directory | EnumEntryKind::Other => {}
        }
    }
    Ok(())
}

fn _read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n_filled = 0;
    while n_filled < buf.len() {
        match reader.read(&mut buf[n_filled..]) {
            Ok(0) => break,
            Ok(n) => n_filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n_filled)
}

/// `true` when both files hold the same bytes.
pub fn files_match(path_a: &Path, path_b: &Path) -> Result<bool, CopyError> {
    let meta_a = fs::metadata(path_a).map_err(|e| CopyError::from_io(path_a, e))?;
    let meta_b = fs::metadata(path_b).map_err(|e| CopyError::from_io(path_b, e))?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut file_a = File::open(path_a).map_err(|e| CopyError::from_io(path_a, e))?;
    let mut file_b = File::open(path_b).map_err(|e| CopyError::from_io(path_b, e))?;
    let mut buf_a = vec![0_u8; N_BYTES_BUFFER];
    let mut buf_b = vec![0_u8; N_BYTES_BUFFER];
    loop {
        let n_a = _read_full(&mut file_a, &mut buf_a).map_err(|e| CopyError::Io {
            path: path_a.to_path_buf(),
            source: e,
        })?;
        let n_b = _read_full(&mut file_b, &mut buf_b).map_err(|e| CopyError::Io {
            path: path_b.to_path_buf(),
            source: e,
        })?;
        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{files_match, verify_tree};
    use crate::copy::copy_dir;
    use crate::spec::{EnumCopyErrorKind, SpecCopyOptions};
    use crate::util::N_BYTES_BUFFER;

    fn write_bytes(path: &Path, data: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, data).expect("write bytes");
    }

    #[test]
    fn verify_passes_after_copy() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_bytes(&src.join("a.txt"), b"hello");
        write_bytes(&src.join("b.txt"), b"");
        write_bytes(&src.join("deep/c.bin"), &vec![3_u8; N_BYTES_BUFFER + 1]);

        copy_dir(&src, &dst, SpecCopyOptions::default()).expect("copy");
        let report = verify_tree(&src, &dst, &SpecCopyOptions::default()).expect("verify");
        assert!(report.is_success());
        assert_eq!(report.cnt_checked, 3);
    }

    #[test]
    fn verify_flags_changed_and_missing_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_bytes(&src.join("a.txt"), b"hello");
        write_bytes(&src.join("b.txt"), b"world");
        copy_dir(&src, &dst, SpecCopyOptions::default()).expect("copy");

        write_bytes(&dst.join("a.txt"), b"HELLO");
        fs::remove_file(dst.join("b.txt")).expect("remove");

        let report = verify_tree(&src, &dst, &SpecCopyOptions::default()).expect("verify");
        assert_eq!(report.mismatches.len(), 2);
        assert_eq!(report.mismatches[0].path, dst.join("a.txt"));
        assert_eq!(report.mismatches[1].kind, EnumCopyErrorKind::NotFound);
    }

    #[test]
    fn verify_respects_recursion_and_excludes() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_bytes(&src.join("a.txt"), b"a");
        write_bytes(&src.join("skip.tmp"), b"t");
        write_bytes(&src.join("sub/b.txt"), b"b");

        let spec_cp_options = SpecCopyOptions {
            if_recursive: false,
            patterns_exclude: Some(vec!["*.tmp".to_string()]),
            ..SpecCopyOptions::default()
        };
        copy_dir(&src, &dst, spec_cp_options.clone()).expect("copy");
        let report = verify_tree(&src, &dst, &spec_cp_options).expect("verify");
        assert!(report.is_success());
        assert_eq!(report.cnt_checked, 1);
    }

    #[cfg(unix)]
    #[test]
    fn verify_checks_non_utf8_names_against_their_own_copy() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_bytes(&src.join(OsStr::from_bytes(b"caf\xe9.txt")), b"latin1");
        copy_dir(&src, &dst, SpecCopyOptions::default()).expect("copy");

        let report = verify_tree(&src, &dst, &SpecCopyOptions::default()).expect("verify");
        assert!(report.is_success());
        assert_eq!(report.cnt_checked, 1);
    }

    #[test]
    fn files_match_detects_same_length_difference_past_first_chunk() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_a = tmp.path().join("a.bin");
        let path_b = tmp.path().join("b.bin");
        let data_a = vec![1_u8; N_BYTES_BUFFER * 2];
        let mut data_b = data_a.clone();
        data_b[N_BYTES_BUFFER + 5] = 2;
        write_bytes(&path_a, &data_a);
        write_bytes(&path_b, &data_b);

        assert!(!files_match(&path_a, &path_b).expect("compare"));
        assert!(files_match(&path_a, &path_a).expect("compare"));
    }
}
