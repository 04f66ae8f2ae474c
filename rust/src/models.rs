//! Core data types for the scheduling system.

use chrono::{DateTime, Utc};
use pyo3::prelude::*;
use std::fmt;

use crate::clock::SimTime;
use crate::worker::WorkerId;

/// Feedback queue level, ordered from most to least urgent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    High,
    Mid,
    Low,
}

impl Level {
    /// Selection order: High before Mid before Low.
    pub const ALL: [Level; 3] = [Level::High, Level::Mid, Level::Low];

    pub const fn index(self) -> usize {
        match self {
            Level::High => 0,
            Level::Mid => 1,
            Level::Low => 2,
        }
    }

    /// One level down after a full quantum. Low is the floor.
    pub const fn demote(self) -> Level {
        match self {
            Level::High => Level::Mid,
            Level::Mid | Level::Low => Level::Low,
        }
    }

    /// Quantum granted at this level, as a multiple of the base quantum.
    pub const fn quantum_multiplier(self) -> u64 {
        match self {
            Level::High => 1,
            Level::Mid => 2,
            Level::Low => 4,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::High => "high",
            Level::Mid => "mid",
            Level::Low => "low",
        };
        write!(f, "{label}")
    }
}

/// Process-control entry for one occupied table slot.
///
/// A free slot is `None` in the table, so there is no separate occupied flag
/// and nothing to zero on release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessEntry {
    pub worker: WorkerId,
    /// When the entry last became runnable
    pub ready_since: SimTime,
    /// Cumulative consumed time
    pub service_time: SimTime,
    pub blocked: bool,
    /// Only meaningful while `blocked`
    pub blocked_until: SimTime,
}

impl ProcessEntry {
    pub fn new(worker: WorkerId, now: SimTime) -> Self {
        Self {
            worker,
            ready_since: now,
            service_time: SimTime::ZERO,
            blocked: false,
            blocked_until: SimTime::ZERO,
        }
    }
}

/// One occupied slot as seen in a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotView {
    pub slot: usize,
    pub worker: WorkerId,
    pub blocked: bool,
    pub service_time: SimTime,
}

/// Head/tail cursors of one feedback queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueCursor {
    pub level: Level,
    pub head: usize,
    pub tail: usize,
}

/// Full table and queue picture handed to observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub clock: SimTime,
    pub slots: Vec<SlotView>,
    pub cursors: [QueueCursor; 3],
}

/// Statistics computed once at the end of a run.
#[pyclass]
#[derive(Clone, Debug)]
pub struct RunSummary {
    #[pyo3(get)]
    pub total_spawned: u32,
    #[pyo3(get)]
    pub dispatches: u64,
    /// Total dispatch wait divided by total spawned
    #[pyo3(get)]
    pub avg_wait_ns: u64,
    /// Total blocked time divided by total spawned
    #[pyo3(get)]
    pub avg_blocked_ns: u64,
    /// Consumed time over elapsed simulated time, in percent
    #[pyo3(get)]
    pub cpu_utilization: f64,
    #[pyo3(get)]
    pub idle_ns: u64,
    #[pyo3(get)]
    pub consumed_ns: u64,
    #[pyo3(get)]
    pub elapsed_ns: u64,
    /// True when the run ended on an interrupt or the wall-clock deadline
    #[pyo3(get)]
    pub cancelled: bool,
    #[pyo3(get)]
    pub started_at: DateTime<Utc>,
    #[pyo3(get)]
    pub finished_at: DateTime<Utc>,
}

#[pymethods]
impl RunSummary {
    fn __repr__(&self) -> String {
        format!(
            "RunSummary(spawned={}, dispatches={}, cpu_utilization={:.2}, cancelled={})",
            self.total_spawned, self.dispatches, self.cpu_utilization, self.cancelled
        )
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "processes spawned:      {}", self.total_spawned)?;
        writeln!(f, "dispatches:             {}", self.dispatches)?;
        writeln!(
            f,
            "average wait:           {}",
            SimTime::from_nanos(self.avg_wait_ns)
        )?;
        writeln!(
            f,
            "average blocked time:   {}",
            SimTime::from_nanos(self.avg_blocked_ns)
        )?;
        writeln!(f, "cpu utilization:        {:.2}%", self.cpu_utilization)?;
        writeln!(
            f,
            "idle time:              {}",
            SimTime::from_nanos(self.idle_ns)
        )?;
        writeln!(
            f,
            "simulated time:         {}",
            SimTime::from_nanos(self.elapsed_ns)
        )?;
        write!(
            f,
            "wall time:              {} ms{}",
            (self.finished_at - self.started_at).num_milliseconds(),
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demotion_is_one_step() {
        assert_eq!(Level::High.demote(), Level::Mid);
        assert_eq!(Level::Mid.demote(), Level::Low);
        assert_eq!(Level::Low.demote(), Level::Low);
    }

    #[test]
    fn test_quantum_multipliers() {
        let multipliers: Vec<u64> = Level::ALL.iter().map(|l| l.quantum_multiplier()).collect();
        assert_eq!(multipliers, vec![1, 2, 4]);
    }

    #[test]
    fn test_new_entry_is_ready() {
        let entry = ProcessEntry::new(WorkerId(7), SimTime::new(1, 5));
        assert!(!entry.blocked);
        assert_eq!(entry.ready_since, SimTime::new(1, 5));
        assert_eq!(entry.service_time, SimTime::ZERO);
    }
}
