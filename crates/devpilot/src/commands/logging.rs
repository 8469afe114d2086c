//! Logging initialization for the CLI.

use devpilot_util::log::{self, LogConfig, LogLevel};
use std::path::PathBuf;

/// Initialize logging based on verbosity and mode.
///
/// The server logs to stdout. One-shot commands log to a file, keeping stdout
/// for their JSON output. Returns the log file path if logging to file.
pub fn init_logging(verbose: bool, serving: bool) -> Option<PathBuf> {
    let level = if verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    log::init(LogConfig {
        print: serving,
        level,
        include_location: verbose,
        file: None,
    })
}
