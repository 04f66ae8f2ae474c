//! Run one simulation with default settings, printing events to stderr.
//!
//! Ctrl+C or the wall-clock limit cancels the run; either exits with status 1.

use std::process::ExitCode;

use mlfq_rust::logging::VERBOSITY_CHANGES;
use mlfq_rust::{log_fatal, simulate, SchedulerError, ShutdownToken, SimulationConfig};

fn main() -> ExitCode {
    let config = SimulationConfig {
        verbosity: VERBOSITY_CHANGES,
        ..SimulationConfig::default()
    };

    let shutdown = ShutdownToken::with_deadline_secs(config.real_time_limit_secs);
    let interrupt = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || interrupt.cancel()) {
        log_fatal!("failed to install interrupt handler: {}", e);
        return ExitCode::FAILURE;
    }

    match simulate(config, shutdown) {
        Ok(summary) => {
            println!("{summary}");
            if summary.cancelled {
                eprintln!("Run cancelled before all processes finished");
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(SchedulerError::Config(e)) => {
            log_fatal!("invalid configuration: {}", e);
            ExitCode::FAILURE
        }
        // Already reported by the dispatcher
        Err(_) => ExitCode::FAILURE,
    }
}
