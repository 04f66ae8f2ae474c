//! Verbosity-gated logging macros for the dispatcher.
//!
//! Logging is a no-op below the configured level. Levels:
//! - 0: SILENT (fatal errors only)
//! - 1: CHANGES (admissions, terminations, blocks, snapshots)
//! - 2: CHECKS (dispatch decisions, demotions, unblocks, deferred admissions)
//! - 3: DEBUG (idle jumps, overhead draws, raw payloads)

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Write to stderr when `verbosity` is at least `level`.
#[doc(hidden)]
#[macro_export]
macro_rules! log_at {
    ($level:ident, $verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::$level {
            eprintln!($($arg)*);
        }
    };
}

/// Admissions, terminations, blocks, snapshots (verbosity >= 1).
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!(VERBOSITY_CHANGES, $verbosity, $($arg)*)
    };
}

/// Dispatch decisions, demotions, unblocks (verbosity >= 2).
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!(VERBOSITY_CHECKS, $verbosity, $($arg)*)
    };
}

/// Idle jumps, overhead draws, raw payloads (verbosity >= 3).
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!(VERBOSITY_DEBUG, $verbosity, $($arg)*)
    };
}

/// Always logged, regardless of verbosity. Names the failing operation.
#[macro_export]
macro_rules! log_fatal {
    ($($arg:tt)*) => {
        eprintln!("FATAL: {}", format_args!($($arg)*));
    };
}
