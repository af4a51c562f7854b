mod args;

use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use hogback_io_fs::{
    ReportCopy, SpecBackupOptions, backup, copy_dir, list_backup_sets, validate_backup_sets,
};
use log::{error, info};

use crate::args::{Cli, Commands};

const N_BYTES_PER_GB: u64 = 1024 * 1024 * 1024;
const EXIT_INCOMPLETE: u8 = 3;

fn print_copy_report(report_copy: &ReportCopy) {
    println!("{report_copy}");
    for spec_err in &report_copy.errors {
        println!("  {}: {}", spec_err.path.display(), spec_err.exception);
    }
}

/// Run one subcommand. `Ok(false)` means it finished with per-item problems.
fn execute(command: Commands) -> Result<bool> {
    match command {
        Commands::Copy {
            source,
            dest,
            flags,
            dry_run,
        } => {
            let report_copy = copy_dir(&source, &dest, flags.to_options(dry_run))
                .with_context(|| format!("copy of {} failed", source.display()))?;
            print_copy_report(&report_copy);
            Ok(report_copy.is_success())
        }

        Commands::Backup {
            source,
            dest,
            max_space,
            verify,
            flags,
        } => {
            let n_bytes_max = max_space
                .map(|n_gb| {
                    n_gb.checked_mul(N_BYTES_PER_GB)
                        .ok_or_else(|| anyhow!("--max-space {n_gb} GB is too large"))
                })
                .transpose()?;
            let spec_bk_options = SpecBackupOptions {
                spec_cp_options: flags.to_options(false),
                n_bytes_max,
                if_verify: verify,
            };

            let report_backup = backup(&source, &dest, spec_bk_options)
                .with_context(|| format!("backup of {} failed", source.display()))?;
            print_copy_report(&report_backup.report_copy);
            if let Some(report_prune) = &report_backup.report_prune {
                println!("{report_prune}");
            }
            if let Some(report_verify) = &report_backup.report_verify {
                println!("{report_verify}");
                for spec_err in &report_verify.mismatches {
                    println!("  {}: {}", spec_err.path.display(), spec_err.exception);
                }
            }

            if report_backup.is_success() {
                println!(
                    "Backup successful: created set {}",
                    report_backup.name_set
                );
                Ok(true)
            } else {
                println!(
                    "Backup finished with errors: created set {}",
                    report_backup.name_set
                );
                Ok(false)
            }
        }

        Commands::List { backup_root } => {
            let l_sets = list_backup_sets(&backup_root)
                .with_context(|| format!("cannot list {}", backup_root.display()))?;
            if l_sets.is_empty() {
                println!("No backup sets found");
            }
            for spec_set in l_sets {
                println!(
                    "{}  files={} bytes={}",
                    spec_set.name, spec_set.cnt_files, spec_set.n_bytes
                );
            }
            Ok(true)
        }

        Commands::Validate { backup_root } => {
            let l_issues = validate_backup_sets(&backup_root)
                .with_context(|| format!("cannot validate {}", backup_root.display()))?;
            if l_issues.is_empty() {
                println!("All backups are valid!");
                return Ok(true);
            }
            println!("Found {} issues:", l_issues.len());
            for spec_issue in l_issues {
                println!("{}: {}", spec_issue.path.display(), spec_issue.issue);
            }
            Ok(false)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    hogback_log::init_logger(hogback_log::default_level(cli.verbose, cli.quiet));

    match execute(cli.command) {
        Ok(true) => {
            info!("Execution completed successfully");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            error!("Execution completed with errors");
            ExitCode::from(EXIT_INCOMPLETE)
        }
        Err(err) => {
            error!("Execution failed.");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
