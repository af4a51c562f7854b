//! File copy primitives and directory copy orchestration.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::list::{list_directory, sort_entries};
use crate::report::{ReportCopy, ReportCopyBuilder};
use crate::spec::{
    BackupError, CopyError, EnumCopyTransferMode, EnumCopyWriteMode, EnumEntryKind,
    SpecCopyOptions, SpecCopyTask, SpecDirEntry,
};
use crate::util::{C_PREFIX_PARTIAL, N_BYTES_BUFFER, SpecExcludePatterns, is_overlap};

#[derive(Debug)]
struct SpecCopyContext {
    spec_cp_options: SpecCopyOptions,
    spec_patterns: SpecExcludePatterns,
    builder_cp_report: ReportCopyBuilder,
}

////////////////////////////////////////////////////////////////////////////////
// #region FileCopy

/// Copy all bytes of `source` into `destination`, creating or truncating it.
///
/// Returns the number of bytes transferred. The source is opened first, so a
/// missing source never touches the destination.
pub fn copy_file<P, Q>(source: P, destination: Q) -> Result<u64, CopyError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    copy_file_with_options(
        source,
        destination,
        EnumCopyWriteMode::InPlace,
        EnumCopyTransferMode::Copy,
    )
}

/// [`copy_file`] with explicit commit and transfer strategies.
///
/// - [`EnumCopyWriteMode::AtomicRename`]: bytes land in a hidden temporary file
///   next to the destination which is synced and renamed into place on
///   success, and removed on failure.
/// - [`EnumCopyTransferMode::HardLinkOrCopy`]: an existing destination file is
///   replaced by a hard link to the source; any link failure falls back to a
///   byte copy.
pub fn copy_file_with_options<P, Q>(
    source: P,
    destination: Q,
    rule_write: EnumCopyWriteMode,
    rule_transfer: EnumCopyTransferMode,
) -> Result<u64, CopyError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_src = source.as_ref();
    let path_dst = destination.as_ref();

    if rule_transfer == EnumCopyTransferMode::HardLinkOrCopy {
        match _link_file(path_src, path_dst) {
            Ok(n_bytes) => return Ok(n_bytes),
            Err(e) => log::debug!(
                "hard link {} -> {} failed ({e}); copying bytes",
                path_src.display(),
                path_dst.display()
            ),
        }
    }

    match rule_write {
        EnumCopyWriteMode::InPlace => _copy_in_place(path_src, path_dst),
        EnumCopyWriteMode::AtomicRename => _copy_atomic(path_src, path_dst),
    }
}

fn _open_source(path_src: &Path) -> Result<BufReader<File>, CopyError> {
    let file_src = File::open(path_src).map_err(|e| CopyError::from_io(path_src, e))?;
    Ok(BufReader::with_capacity(N_BYTES_BUFFER, file_src))
}

fn _transfer<R, W>(
    reader: &mut R,
    writer: &mut W,
    path_src: &Path,
    path_dst: &Path,
) -> Result<u64, CopyError>
where
    R: BufRead,
    W: Write,
{
    let mut n_bytes = 0_u64;
    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(CopyError::Io {
                    path: path_src.to_path_buf(),
                    source: e,
                });
            }
        };
        if buf.is_empty() {
            break;
        }
        let n_chunk = buf.len();
        writer.write_all(buf).map_err(|e| CopyError::Io {
            path: path_dst.to_path_buf(),
            source: e,
        })?;
        reader.consume(n_chunk);
        n_bytes += n_chunk as u64;
    }
    writer.flush().map_err(|e| CopyError::Io {
        path: path_dst.to_path_buf(),
        source: e,
    })?;
    Ok(n_bytes)
}

fn _copy_in_place(path_src: &Path, path_dst: &Path) -> Result<u64, CopyError> {
    let mut reader = _open_source(path_src)?;
    // Truncating a hard link to the source would wipe the source too.
    if let Some(n_bytes) = _same_file_len(path_src, path_dst) {
        return Ok(n_bytes);
    }
    let mut file_dst = File::create(path_dst).map_err(|e| CopyError::from_io(path_dst, e))?;
    _transfer(&mut reader, &mut file_dst, path_src, path_dst)
}

fn _parent_dir(path_dst: &Path) -> &Path {
    match path_dst.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn _copy_atomic(path_src: &Path, path_dst: &Path) -> Result<u64, CopyError> {
    let mut reader = _open_source(path_src)?;
    let mut file_tmp = tempfile::Builder::new()
        .prefix(C_PREFIX_PARTIAL)
        .tempfile_in(_parent_dir(path_dst))
        .map_err(|e| CopyError::from_io(path_dst, e))?;
    let n_bytes = _transfer(&mut reader, file_tmp.as_file_mut(), path_src, path_dst)?;
    file_tmp.as_file().sync_all().map_err(|e| CopyError::Io {
        path: path_dst.to_path_buf(),
        source: e,
    })?;
    file_tmp
        .persist(path_dst)
        .map_err(|e| CopyError::from_io(path_dst, e.error))?;
    Ok(n_bytes)
}

fn _link_file(path_src: &Path, path_dst: &Path) -> io::Result<u64> {
    let meta_src = fs::metadata(path_src)?;
    if let Some(n_bytes) = _same_file_len(path_src, path_dst) {
        return Ok(n_bytes);
    }
    // The destination is only replaced by the final rename.
    let link_tmp = tempfile::Builder::new()
        .prefix(C_PREFIX_PARTIAL)
        .make_in(_parent_dir(path_dst), |path_tmp| {
            fs::hard_link(path_src, path_tmp)
        })?;
    link_tmp.persist(path_dst).map_err(|e| e.error)?;
    Ok(meta_src.len())
}

#[cfg(unix)]
fn _same_file_len(path_src: &Path, path_dst: &Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;

    let stat_src = fs::metadata(path_src).ok()?;
    let stat_dst = fs::metadata(path_dst).ok()?;
    (stat_src.dev() == stat_dst.dev() && stat_src.ino() == stat_dst.ino()).then(|| stat_src.len())
}

#[cfg(not(unix))]
fn _same_file_len(_path_src: &Path, _path_dst: &Path) -> Option<u64> {
    None
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DirectoryCopy

/// Check that `path_dir_src` exists and is a directory.
pub(crate) fn validate_source_dir(path_dir_src: &Path) -> Result<(), BackupError> {
    match fs::metadata(path_dir_src) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(BackupError::SourceNotDirectory(path_dir_src.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(BackupError::SourceNotFound(path_dir_src.to_path_buf()))
        }
        Err(e) => Err(BackupError::List(CopyError::from_io(path_dir_src, e))),
    }
}

/// Copy the entries of `dir_source` into `dir_destination`.
///
/// Files are copied with the configured strategies, directories are recursed
/// into (or skipped with a warning when `if_recursive` is off), and anything
/// else is skipped with a warning. Entries are processed in name order.
///
/// Returns [`ReportCopy`] when the run completes, with per-entry failures
/// stored in the report. Returns [`BackupError`] only for setup failures, all
/// of which are detected before the destination is created.
pub fn copy_dir<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_cp_options: SpecCopyOptions,
) -> Result<ReportCopy, BackupError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref().to_path_buf();
    let path_dir_dst = dir_destination.as_ref().to_path_buf();

    validate_source_dir(&path_dir_src)?;
    if is_overlap(&path_dir_src, &path_dir_dst) {
        return Err(BackupError::SourceDestinationOverlap {
            path_src: path_dir_src,
            path_dst: path_dir_dst,
        });
    }
    let spec_patterns = SpecExcludePatterns::from_raw(spec_cp_options.patterns_exclude.as_deref())?;
    let l_entries = list_directory(&path_dir_src)?;

    if !spec_cp_options.if_dry_run {
        fs::create_dir_all(&path_dir_dst).map_err(|e| BackupError::DestinationInitFailed {
            path: path_dir_dst.clone(),
            message: e.to_string(),
        })?;
    }

    log::info!(
        "backing up folder {} into {}",
        path_dir_src.display(),
        path_dir_dst.display()
    );
    let mut spec_cp_ctx = SpecCopyContext {
        spec_cp_options,
        spec_patterns,
        builder_cp_report: ReportCopyBuilder::default(),
    };
    copy_entries(&path_dir_dst, l_entries, &mut spec_cp_ctx);
    Ok(spec_cp_ctx.builder_cp_report.build())
}

fn walk_directory(path_dir_src: &Path, path_dir_dst: &Path, spec_cp_ctx: &mut SpecCopyContext) {
    let l_entries = match list_directory(path_dir_src) {
        Ok(v) => v,
        Err(e) => {
            spec_cp_ctx.builder_cp_report.add_error(&e);
            return;
        }
    };

    if spec_cp_ctx.spec_cp_options.if_dry_run {
        log::info!("would create folder {}", path_dir_dst.display());
        spec_cp_ctx.builder_cp_report.add_skipped();
    } else if let Err(e) = fs::create_dir_all(path_dir_dst) {
        spec_cp_ctx
            .builder_cp_report
            .add_error(&CopyError::from_io(path_dir_dst, e));
        return;
    } else {
        spec_cp_ctx.builder_cp_report.add_dir_created();
    }

    log::info!(
        "backing up folder {} into {}",
        path_dir_src.display(),
        path_dir_dst.display()
    );
    copy_entries(path_dir_dst, l_entries, spec_cp_ctx);
}

fn copy_entries(
    path_dir_dst: &Path,
    mut l_entries: Vec<SpecDirEntry>,
    spec_cp_ctx: &mut SpecCopyContext,
) {
    sort_entries(&mut l_entries);

    for spec_entry in l_entries {
        spec_cp_ctx.builder_cp_report.add_scanned();
        if spec_cp_ctx.spec_patterns.is_excluded(&spec_entry.name) {
            log::debug!("excluded {}", spec_entry.path.display());
            spec_cp_ctx.builder_cp_report.add_skipped();
            continue;
        }

        let spec_task = SpecCopyTask::from_entry(&spec_entry, path_dir_dst);
        match spec_entry.kind {
            EnumEntryKind::File => handle_file_task(spec_task, spec_cp_ctx),
            EnumEntryKind::Directory if spec_cp_ctx.spec_cp_options.if_recursive => {
                walk_directory(&spec_task.path_src, &spec_task.path_dst, spec_cp_ctx);
            }
            EnumEntryKind::Directory => {
                spec_cp_ctx.builder_cp_report.add_warning(format!(
                    "Directory skipped (recursion disabled): {}",
                    spec_entry.path.display()
                ));
                spec_cp_ctx.builder_cp_report.add_skipped();
            }
            EnumEntryKind::Other => {
                spec_cp_ctx.builder_cp_report.add_warning(format!(
                    "Special file skipped: {}",
                    spec_entry.path.display()
                ));
                spec_cp_ctx.builder_cp_report.add_skipped();
            }
        }
    }
}

fn handle_file_task(spec_task: SpecCopyTask, spec_cp_ctx: &mut SpecCopyContext) {
    let SpecCopyTask { path_src, path_dst } = spec_task;
    if spec_cp_ctx.spec_cp_options.if_dry_run {
        log::info!(
            "would copy {} to {}",
            path_src.display(),
            path_dst.display()
        );
        spec_cp_ctx.builder_cp_report.add_skipped();
        return;
    }

    log::info!("copying {} to {}", path_src.display(), path_dst.display());
    let res_copy = copy_file_with_options(
        &path_src,
        &path_dst,
        spec_cp_ctx.spec_cp_options.rule_write,
        spec_cp_ctx.spec_cp_options.rule_transfer,
    );
    match res_copy {
        Ok(n_bytes) => {
            log::info!("copied {n_bytes} bytes");
            spec_cp_ctx
                .builder_cp_report
                .add_copied_file(path_dst, n_bytes);
        }
        Err(e) => spec_cp_ctx.builder_cp_report.add_error(&e),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
