//! The dispatcher's exclusively owned scheduling state.

use crate::clock::{SimTime, SimulatedClock, NANOS_PER_SEC};
use crate::models::{Level, Snapshot};

use super::queues::FeedbackQueues;
use super::table::ProcessTable;

/// Clock, process table, queues and admission counters.
///
/// Owned by one dispatcher and mutated only by it; workers never see it.
#[derive(Clone, Debug)]
pub struct SchedulerState {
    pub clock: SimulatedClock,
    pub table: ProcessTable,
    pub queues: FeedbackQueues,
    /// Slot whose handshake is in flight
    pub running: Option<usize>,
    /// Processes spawned over the whole run
    pub total_spawned: u32,
    /// Live processes; always equals the table's occupied count
    pub population: usize,
    /// When the arrival generator next gets to admit
    pub next_arrival: SimTime,
    /// Clock value at the last periodic snapshot
    pub last_snapshot: SimTime,
}

impl SchedulerState {
    pub fn new(capacity: usize) -> Self {
        Self {
            clock: SimulatedClock::new(),
            table: ProcessTable::new(capacity),
            queues: FeedbackQueues::new(capacity),
            running: None,
            total_spawned: 0,
            population: 0,
            next_arrival: SimTime::ZERO,
            last_snapshot: SimTime::ZERO,
        }
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            clock: self.now(),
            slots: self.table.views(),
            cursors: self.queues.cursors(),
        }
    }

    /// Verify queue exclusivity, conservation and clock normalization.
    ///
    /// Every occupied slot must be in exactly one of: a queue, blocked, or
    /// running. Free slots must be nowhere.
    pub fn check_invariants(&self, lifetime_cap: u32) -> Result<(), String> {
        if self.now().nanoseconds as u64 >= NANOS_PER_SEC {
            return Err(format!("clock not normalized: {:?}", self.now()));
        }
        if self.population != self.table.occupied() {
            return Err(format!(
                "population {} != occupied slots {}",
                self.population,
                self.table.occupied()
            ));
        }
        if self.population > self.table.capacity() {
            return Err(format!("population {} over capacity", self.population));
        }
        if self.total_spawned > lifetime_cap {
            return Err(format!(
                "spawned {} over lifetime cap {}",
                self.total_spawned, lifetime_cap
            ));
        }

        let mut placements = vec![0usize; self.table.capacity()];
        for level in Level::ALL {
            for slot in self.queues.level(level).iter() {
                match placements.get_mut(slot) {
                    Some(count) => *count += 1,
                    None => return Err(format!("{level} queue holds bad slot {slot}")),
                }
            }
        }
        if let Some(slot) = self.running {
            placements[slot] += 1;
        }
        for (slot, entry) in self.table.iter() {
            if entry.blocked {
                placements[slot] += 1;
            }
        }

        for (slot, count) in placements.iter().enumerate() {
            let occupied = self.table.get(slot).is_some();
            match (occupied, *count) {
                (true, 1) | (false, 0) => {}
                (true, n) => return Err(format!("slot {slot} placed {n} times")),
                (false, n) => return Err(format!("free slot {slot} placed {n} times")),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::WorkerId;

    #[test]
    fn test_fresh_state_is_consistent() {
        let state = SchedulerState::new(4);
        assert!(state.check_invariants(20).is_ok());
        let snapshot = state.snapshot();
        assert!(snapshot.slots.is_empty());
        assert_eq!(snapshot.clock, SimTime::ZERO);
    }

    #[test]
    fn test_detects_double_placement() {
        let mut state = SchedulerState::new(2);
        state.table.admit(0, WorkerId(1), SimTime::ZERO);
        state.population = 1;
        state.total_spawned = 1;
        state.queues.push(Level::High, 0).unwrap();
        assert!(state.check_invariants(20).is_ok());

        state.queues.push(Level::Low, 0).unwrap();
        assert!(state.check_invariants(20).is_err());
    }

    #[test]
    fn test_detects_lost_entry() {
        let mut state = SchedulerState::new(2);
        state.table.admit(1, WorkerId(1), SimTime::ZERO);
        state.population = 1;
        assert!(state.check_invariants(20).is_err());
    }
}
