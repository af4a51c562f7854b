//! Command-line surface.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use hogback_io_fs::{EnumCopyTransferMode, EnumCopyWriteMode, SpecCopyOptions};

#[derive(Debug, Parser)]
#[command(name = "hogback", author, version, about = "Copy directory trees and keep rotating backup sets")]
pub struct Cli {
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Copy the contents of one directory into another
    Copy {
        /// Directory to copy from
        #[arg(short, long)]
        source: PathBuf,

        /// Directory to copy into (created if missing)
        #[arg(short, long)]
        dest: PathBuf,

        #[command(flatten)]
        flags: ArgsCopyFlags,

        /// Report what would be copied without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Create a new backup set
    Backup {
        /// Source directory to back up
        #[arg(short, long)]
        source: PathBuf,

        /// Backup root holding the sets
        #[arg(short, long)]
        dest: PathBuf,

        /// Space budget for all sets, in GB; oldest sets are pruned past it
        #[arg(short, long)]
        max_space: Option<u64>,

        /// Compare every copied file with its source afterwards
        #[arg(long)]
        verify: bool,

        #[command(flatten)]
        flags: ArgsCopyFlags,
    },

    /// List existing backup sets
    List {
        /// Backup root directory
        #[arg(short, long)]
        backup_root: PathBuf,
    },

    /// Check existing backup sets for leftovers and damage
    Validate {
        /// Backup root directory
        #[arg(short, long)]
        backup_root: PathBuf,
    },
}

/// Flags shared by `copy` and `backup`.
#[derive(Debug, Args)]
pub struct ArgsCopyFlags {
    /// Copy only the top level; subdirectories are skipped
    #[arg(long)]
    pub no_recursive: bool,

    /// Write each file to a temp name and rename it into place
    #[arg(long)]
    pub atomic: bool,

    /// Hard-link files instead of copying bytes, falling back to a copy
    #[arg(long)]
    pub hard_link: bool,

    /// Skip entries whose name matches this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,
}

impl ArgsCopyFlags {
    pub fn to_options(&self, if_dry_run: bool) -> SpecCopyOptions {
        SpecCopyOptions {
            if_recursive: !self.no_recursive,
            rule_write: if self.atomic {
                EnumCopyWriteMode::AtomicRename
            } else {
                EnumCopyWriteMode::InPlace
            },
            rule_transfer: if self.hard_link {
                EnumCopyTransferMode::HardLinkOrCopy
            } else {
                EnumCopyTransferMode::Copy
            },
            patterns_exclude: (!self.exclude.is_empty()).then(|| self.exclude.clone()),
            if_dry_run,
        }
    }
}
