//! Logger setup shared by the `hogback` binaries.

use log::LevelFilter;

pub const C_ENV_LOG_FILTER: &str = "HOGBACK_LOG";
pub const C_ENV_LOG_STYLE: &str = "HOGBACK_LOG_STYLE";

/// Default filter for the given `-v` count and `--quiet` flag.
///
/// `--quiet` wins over any verbosity.
pub fn default_level(n_verbose: u8, if_quiet: bool) -> LevelFilter {
    if if_quiet {
        return LevelFilter::Warn;
    }
    match n_verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the global logger.
///
/// `HOGBACK_LOG` overrides `level` when set. Calling this twice is harmless;
/// the second call leaves the first logger in place.
pub fn init_logger(level: LevelFilter) {
    let name_level = level.as_str().to_ascii_lowercase();
    let _ = env_logger::Builder::from_env(
        env_logger::Env::new()
            .filter_or(C_ENV_LOG_FILTER, name_level)
            .write_style(C_ENV_LOG_STYLE),
    )
    .format_target(false)
    .try_init();
}
