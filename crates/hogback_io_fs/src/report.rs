//! Run report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::{CopyError, SpecCopyError};

/// One file committed at the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCopiedFile {
    pub path_dst: PathBuf,
    pub n_bytes: u64,
}

/// Aggregate counters and diagnostics for one `copy_dir` run.
#[derive(Debug, Default, Clone)]
pub struct ReportCopy {
    /// Total listed entries.
    pub cnt_scanned: u64,
    /// Number of files successfully committed.
    pub cnt_copied: u64,
    /// Number of destination subdirectories created.
    pub cnt_dirs_created: u64,
    /// Number of entries skipped by pattern, kind, or dry-run.
    pub cnt_skipped: u64,
    /// Sum of bytes over [`ReportCopy::files`].
    pub n_bytes_copied: u64,
    /// Copied files in copy order.
    pub files: Vec<SpecCopiedFile>,
    /// Non-fatal warnings collected during traversal/copy.
    pub warnings: Vec<String>,
    /// Per-entry failures.
    pub errors: Vec<SpecCopyError>,
}

impl ReportCopy {
    /// Number of collected hard errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// `true` when no per-entry error was recorded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_dirs_created".to_string(), self.cnt_dirs_created);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("n_bytes_copied".to_string(), self.n_bytes_copied);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} scanned={} copied={} dirs={} skipped={} bytes={} errors={} warnings={}",
            dict_counts["cnt_scanned"],
            dict_counts["cnt_copied"],
            dict_counts["cnt_dirs_created"],
            dict_counts["cnt_skipped"],
            dict_counts["n_bytes_copied"],
            dict_counts["cnt_errors"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[COPY]"))
    }
}

/// Mutable accumulator for copy statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportCopyBuilder {
    /// See [`ReportCopy::cnt_scanned`].
    pub cnt_scanned: u64,
    /// See [`ReportCopy::cnt_copied`].
    pub cnt_copied: u64,
    /// See [`ReportCopy::cnt_dirs_created`].
    pub cnt_dirs_created: u64,
    /// See [`ReportCopy::cnt_skipped`].
    pub cnt_skipped: u64,
    /// See [`ReportCopy::files`].
    pub files: Vec<SpecCopiedFile>,
    /// See [`ReportCopy::errors`].
    pub errors: Vec<SpecCopyError>,
    /// See [`ReportCopy::warnings`].
    pub warnings: Vec<String>,
}

impl ReportCopyBuilder {
    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    /// Count a created destination subdirectory.
    pub fn add_dir_created(&mut self) {
        self.cnt_dirs_created += 1;
    }

    /// Count a copied file and remember its size.
    pub fn add_copied_file(&mut self, path_dst: PathBuf, n_bytes: u64) {
        self.cnt_copied += 1;
        self.files.push(SpecCopiedFile { path_dst, n_bytes });
    }

    pub fn add_skipped(&mut self) {
        self.cnt_skipped += 1;
    }

    pub fn add_warning(&mut self, warning: String) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Add one path-scoped error.
    pub fn add_error(&mut self, err: &CopyError) {
        log::error!("{err}");
        self.errors.push(SpecCopyError::from(err));
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportCopy {
        let n_bytes_copied = self.files.iter().map(|f| f.n_bytes).sum();
        ReportCopy {
            cnt_scanned: self.cnt_scanned,
            cnt_copied: self.cnt_copied,
            cnt_dirs_created: self.cnt_dirs_created,
            cnt_skipped: self.cnt_skipped,
            n_bytes_copied,
            files: self.files,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Outcome of pruning old backup sets.
#[derive(Debug, Default, Clone)]
pub struct ReportPrune {
    /// Removed set directories, oldest first.
    pub removed: Vec<PathBuf>,
    pub n_bytes_before: u64,
    pub n_bytes_after: u64,
    pub errors: Vec<SpecCopyError>,
}

impl ReportPrune {
    /// Fold a later prune pass into this one.
    pub fn merge(&mut self, report_later: ReportPrune) {
        self.removed.extend(report_later.removed);
        self.errors.extend(report_later.errors);
        self.n_bytes_after = report_later.n_bytes_after;
    }
}

impl fmt::Display for ReportPrune {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[PRUNE] removed={} bytes_before={} bytes_after={} errors={}",
            self.removed.len(),
            self.n_bytes_before,
            self.n_bytes_after,
            self.errors.len()
        )
    }
}

/// Outcome of comparing a copy against its source.
#[derive(Debug, Default, Clone)]
pub struct ReportVerify {
    pub cnt_checked: u64,
    /// Destination paths that are missing or differ from their source.
    pub mismatches: Vec<SpecCopyError>,
}

impl ReportVerify {
    pub fn is_success(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for ReportVerify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[VERIFY] checked={} mismatches={}",
            self.cnt_checked,
            self.mismatches.len()
        )
    }
}

/// Everything produced by one backup run.
#[derive(Debug, Clone)]
pub struct ReportBackup {
    pub name_set: String,
    pub path_set: PathBuf,
    pub report_copy: ReportCopy,
    pub report_prune: Option<ReportPrune>,
    pub report_verify: Option<ReportVerify>,
}

impl ReportBackup {
    /// `true` when the copy, prune and verify stages all finished cleanly.
    pub fn is_success(&self) -> bool {
        self.report_copy.is_success()
            && self.report_prune.as_ref().is_none_or(|r| r.errors.is_empty())
            && self.report_verify.as_ref().is_none_or(ReportVerify::is_success)
    }
}
