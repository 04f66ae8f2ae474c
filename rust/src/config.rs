//! Configuration types for the simulation.

use pyo3::prelude::*;
use thiserror::Error;

use crate::clock::SimTime;

/// Rejected configuration values. Raised before the dispatch loop starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("table_capacity must be at least 1")]
    ZeroCapacity,
    #[error("lifetime_cap must be at least 1")]
    ZeroLifetimeCap,
    #[error("base_quantum_ns must be positive and fit a signed payload (got {0})")]
    BadQuantum(u64),
    #[error("{name} range is inverted: {min} > {max}")]
    InvertedRange {
        name: &'static str,
        min: u64,
        max: u64,
    },
    #[error("snapshot_interval_ns must be positive")]
    ZeroSnapshotInterval,
}

/// Scheduler sizing, quanta, and random-draw ranges.
#[pyclass]
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Maximum concurrently live processes (process table slots)
    #[pyo3(get, set)]
    pub table_capacity: usize,
    /// Maximum processes spawned over the whole run
    #[pyo3(get, set)]
    pub lifetime_cap: u32,
    /// High-queue quantum; mid and low get 2x and 4x
    #[pyo3(get, set)]
    pub base_quantum_ns: u64,
    /// Lower bound of the blocking wait draw (inclusive)
    #[pyo3(get, set)]
    pub block_wait_min_ns: u64,
    /// Upper bound of the blocking wait draw (inclusive)
    #[pyo3(get, set)]
    pub block_wait_max_ns: u64,
    /// Whole-second part of the inter-arrival draw: 0..=arrival_max_secs
    #[pyo3(get, set)]
    pub arrival_max_secs: u64,
    /// Sub-second part of the inter-arrival draw: 0..=arrival_max_ns
    #[pyo3(get, set)]
    pub arrival_max_ns: u64,
    /// Lower bound of the per-dispatch overhead draw (inclusive)
    #[pyo3(get, set)]
    pub overhead_min_ns: u64,
    /// Upper bound of the per-dispatch overhead draw (inclusive)
    #[pyo3(get, set)]
    pub overhead_max_ns: u64,
    /// Simulated time between periodic table snapshots
    #[pyo3(get, set)]
    pub snapshot_interval_ns: u64,
    /// Wall-clock limit for a run in seconds (0 = no limit)
    #[pyo3(get, set)]
    pub real_time_limit_secs: u64,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug
    #[pyo3(get, set)]
    pub verbosity: u8,
    /// RNG seed for reproducible runs (None = OS entropy)
    #[pyo3(get, set)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            table_capacity: 18,
            lifetime_cap: 20,
            base_quantum_ns: 10_000_000,
            block_wait_min_ns: 5_000_000,
            block_wait_max_ns: 10_000_000,
            arrival_max_secs: 1,
            arrival_max_ns: 100_000_000,
            overhead_min_ns: 100,
            overhead_max_ns: 10_000,
            snapshot_interval_ns: 500_000_000,
            real_time_limit_secs: 60,
            verbosity: 0,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Check sizing and ranges. Called by the dispatcher before the loop starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.lifetime_cap == 0 {
            return Err(ConfigError::ZeroLifetimeCap);
        }
        // Low quantum is 4x base and travels as an i64 payload
        if self.base_quantum_ns == 0 || self.base_quantum_ns > (i64::MAX / 4) as u64 {
            return Err(ConfigError::BadQuantum(self.base_quantum_ns));
        }
        if self.snapshot_interval_ns == 0 {
            return Err(ConfigError::ZeroSnapshotInterval);
        }
        let ranges = [
            ("block_wait", self.block_wait_min_ns, self.block_wait_max_ns),
            ("overhead", self.overhead_min_ns, self.overhead_max_ns),
        ];
        for (name, min, max) in ranges {
            if min > max {
                return Err(ConfigError::InvertedRange { name, min, max });
            }
        }
        Ok(())
    }

    pub fn snapshot_interval(&self) -> SimTime {
        SimTime::from_nanos(self.snapshot_interval_ns)
    }
}

#[pymethods]
impl SimulationConfig {
    #[new]
    #[pyo3(signature = (
        table_capacity=None,
        lifetime_cap=None,
        base_quantum_ns=None,
        block_wait_min_ns=None,
        block_wait_max_ns=None,
        arrival_max_secs=None,
        arrival_max_ns=None,
        overhead_min_ns=None,
        overhead_max_ns=None,
        snapshot_interval_ns=None,
        real_time_limit_secs=None,
        verbosity=None,
        seed=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        table_capacity: Option<usize>,
        lifetime_cap: Option<u32>,
        base_quantum_ns: Option<u64>,
        block_wait_min_ns: Option<u64>,
        block_wait_max_ns: Option<u64>,
        arrival_max_secs: Option<u64>,
        arrival_max_ns: Option<u64>,
        overhead_min_ns: Option<u64>,
        overhead_max_ns: Option<u64>,
        snapshot_interval_ns: Option<u64>,
        real_time_limit_secs: Option<u64>,
        verbosity: Option<u8>,
        seed: Option<u64>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            table_capacity: table_capacity.unwrap_or(defaults.table_capacity),
            lifetime_cap: lifetime_cap.unwrap_or(defaults.lifetime_cap),
            base_quantum_ns: base_quantum_ns.unwrap_or(defaults.base_quantum_ns),
            block_wait_min_ns: block_wait_min_ns.unwrap_or(defaults.block_wait_min_ns),
            block_wait_max_ns: block_wait_max_ns.unwrap_or(defaults.block_wait_max_ns),
            arrival_max_secs: arrival_max_secs.unwrap_or(defaults.arrival_max_secs),
            arrival_max_ns: arrival_max_ns.unwrap_or(defaults.arrival_max_ns),
            overhead_min_ns: overhead_min_ns.unwrap_or(defaults.overhead_min_ns),
            overhead_max_ns: overhead_max_ns.unwrap_or(defaults.overhead_max_ns),
            snapshot_interval_ns: snapshot_interval_ns.unwrap_or(defaults.snapshot_interval_ns),
            real_time_limit_secs: real_time_limit_secs.unwrap_or(defaults.real_time_limit_secs),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
            seed: seed.or(defaults.seed),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SimulationConfig(table_capacity={}, lifetime_cap={}, base_quantum_ns={}, seed={:?})",
            self.table_capacity, self.lifetime_cap, self.base_quantum_ns, self.seed
        )
    }
}
