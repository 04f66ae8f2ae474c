//! Uniprocessor MLFQ scheduler simulator.
//!
//! A dispatcher advances a simulated clock, admits processes into a bounded
//! table, and hands out quanta from three feedback queues to workers that
//! report back how much of the quantum they used.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

pub mod clock;
mod config;
pub mod logging;
mod models;
pub mod observer;
pub mod scheduler;
pub mod shutdown;
pub mod worker;

pub use clock::{SimTime, SimulatedClock};
pub use config::{ConfigError, SimulationConfig};
pub use models::{Level, ProcessEntry, QueueCursor, RunSummary, SlotView, Snapshot};
pub use observer::{LogObserver, NullObserver, Observer, RecordingObserver, SchedEvent};
pub use scheduler::{seeded_rng, Dispatcher, SchedulerError, Step};
pub use shutdown::ShutdownToken;
pub use worker::{RandomPolicy, ThreadedWorkers, WorkerId, WorkerTransport};

/// Policy for a freshly spawned worker. Seeded runs derive one seed per worker.
pub fn worker_policy(seed: Option<u64>, worker: WorkerId) -> RandomPolicy {
    match seed {
        Some(seed) => RandomPolicy::seeded(seed ^ worker.0.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => RandomPolicy::from_entropy(),
    }
}

/// Run a full simulation with threaded workers and log output on stderr.
pub fn simulate(
    config: SimulationConfig,
    shutdown: ShutdownToken,
) -> Result<RunSummary, SchedulerError> {
    let seed = config.seed;
    let workers = ThreadedWorkers::new(move |id| worker_policy(seed, id));
    let observer = LogObserver::new(config.verbosity);
    let rng = seeded_rng(seed);
    let mut dispatcher = Dispatcher::new(config, workers, observer, rng, shutdown)?;
    dispatcher.run()
}

/// Run the simulator to completion.
///
/// # Arguments
/// * `config` - Sizing, quanta, draw ranges, seed and wall-clock limit
///
/// # Returns
/// * RunSummary with wait, blocked and utilization statistics
///
/// # Raises
/// * ValueError if the configuration is invalid
/// * RuntimeError if a worker fails or breaks the reply protocol
#[pyfunction]
fn run_simulation(py: Python<'_>, config: SimulationConfig) -> PyResult<RunSummary> {
    let shutdown = ShutdownToken::with_deadline_secs(config.real_time_limit_secs);
    match py.allow_threads(move || simulate(config, shutdown)) {
        Ok(summary) => Ok(summary),
        Err(SchedulerError::Config(e)) => Err(PyValueError::new_err(e.to_string())),
        Err(e) => Err(PyRuntimeError::new_err(e.to_string())),
    }
}

/// Python module definition
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Data types
    m.add_class::<RunSummary>()?;

    // Config types
    m.add_class::<SimulationConfig>()?;

    // Simulation
    m.add_function(wrap_pyfunction!(run_simulation, m)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_threaded_run() {
        let config = SimulationConfig {
            table_capacity: 4,
            lifetime_cap: 6,
            real_time_limit_secs: 0,
            seed: Some(11),
            ..SimulationConfig::default()
        };
        let summary = simulate(config, ShutdownToken::new()).unwrap();
        assert_eq!(summary.total_spawned, 6);
        assert!(!summary.cancelled);
        assert!(summary.dispatches >= 6);
    }

    #[test]
    fn test_simulate_rejects_bad_config() {
        let config = SimulationConfig {
            table_capacity: 0,
            ..SimulationConfig::default()
        };
        let err = simulate(config, ShutdownToken::new()).unwrap_err();
        assert!(matches!(err, SchedulerError::Config(ConfigError::ZeroCapacity)));
    }

    #[test]
    fn test_pre_cancelled_run_spawns_nothing() {
        let token = ShutdownToken::new();
        token.cancel();
        let summary = simulate(SimulationConfig::default(), token).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.total_spawned, 0);
    }

    #[test]
    fn test_worker_policies_differ_per_worker() {
        use crate::worker::WorkerPolicy;
        let mut a = worker_policy(Some(1), WorkerId(1));
        let mut b = worker_policy(Some(1), WorkerId(2));
        let mut a_again = worker_policy(Some(1), WorkerId(1));
        let seq = |p: &mut RandomPolicy| (0..32).map(|_| p.respond(1_000)).collect::<Vec<_>>();
        let first = seq(&mut a);
        assert_eq!(first, seq(&mut a_again));
        assert_ne!(first, seq(&mut b));
    }
}
