//! Run statistics accumulated by the dispatcher.

use chrono::{DateTime, Utc};

use crate::clock::SimTime;
use crate::models::RunSummary;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub dispatches: u64,
    /// Sum of (dispatch time - ready since) over all dispatches
    pub total_wait: SimTime,
    /// Sum of drawn blocking waits
    pub total_blocked: SimTime,
    pub consumed: SimTime,
    pub idle: SimTime,
    pub overhead: SimTime,
}

impl RunStats {
    pub fn summarize(
        &self,
        total_spawned: u32,
        elapsed: SimTime,
        cancelled: bool,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> RunSummary {
        let per_process = |total: SimTime| {
            if total_spawned == 0 {
                0
            } else {
                total.as_nanos() / total_spawned as u64
            }
        };
        let elapsed_ns = elapsed.as_nanos();
        let cpu_utilization = if elapsed_ns == 0 {
            0.0
        } else {
            self.consumed.as_nanos() as f64 / elapsed_ns as f64 * 100.0
        };

        RunSummary {
            total_spawned,
            dispatches: self.dispatches,
            avg_wait_ns: per_process(self.total_wait),
            avg_blocked_ns: per_process(self.total_blocked),
            cpu_utilization,
            idle_ns: self.idle.as_nanos(),
            consumed_ns: self.consumed.as_nanos(),
            elapsed_ns,
            cancelled,
            started_at,
            finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_averages() {
        let stats = RunStats {
            dispatches: 10,
            total_wait: SimTime::new(0, 400),
            total_blocked: SimTime::new(1, 0),
            consumed: SimTime::new(1, 0),
            idle: SimTime::new(3, 0),
            overhead: SimTime::ZERO,
        };
        let now = Utc::now();
        let summary = stats.summarize(4, SimTime::new(4, 0), false, now, now);
        assert_eq!(summary.avg_wait_ns, 100);
        assert_eq!(summary.avg_blocked_ns, 250_000_000);
        assert!((summary.cpu_utilization - 25.0).abs() < 1e-9);
        assert_eq!(summary.idle_ns, 3_000_000_000);
    }

    #[test]
    fn test_empty_run_has_no_division_by_zero() {
        let now = Utc::now();
        let summary = RunStats::default().summarize(0, SimTime::ZERO, true, now, now);
        assert_eq!(summary.avg_wait_ns, 0);
        assert_eq!(summary.cpu_utilization, 0.0);
        assert!(summary.cancelled);
    }
}
