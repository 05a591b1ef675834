//! Opt-in terminal logging for binaries and tests.

use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

pub const LOG_LEVEL_OFF: u8 = 0;
pub const LOG_LEVEL_ERROR: u8 = 1;
pub const LOG_LEVEL_WARN: u8 = 2;
pub const LOG_LEVEL_INFO: u8 = 3;
pub const LOG_LEVEL_DEBUG: u8 = 4;
pub const LOG_LEVEL_TRACE: u8 = 5;

/// Map a numeric verbosity to a level filter. Unknown values turn logging off.
pub fn level_from_u8(level: u8) -> LevelFilter {
    match level {
        LOG_LEVEL_ERROR => LevelFilter::Error,
        LOG_LEVEL_WARN => LevelFilter::Warn,
        LOG_LEVEL_INFO => LevelFilter::Info,
        LOG_LEVEL_DEBUG => LevelFilter::Debug,
        LOG_LEVEL_TRACE => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Install a terminal logger at `level`.
///
/// Nothing is logged unless this (or another `log` backend) is installed. Only the first call
/// installs a logger; later calls return `false` and change nothing.
pub fn init(level: LevelFilter) -> bool {
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .is_ok()
}
