//! Bounded process table.

use crate::clock::SimTime;
use crate::models::{ProcessEntry, SlotView};
use crate::worker::WorkerId;

/// Fixed number of slots; `None` is a free slot.
#[derive(Clone, Debug)]
pub struct ProcessTable {
    slots: Vec<Option<ProcessEntry>>,
    occupied: usize,
}

impl ProcessTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            occupied: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn is_full(&self) -> bool {
        self.occupied() == self.capacity()
    }

    /// Lowest-numbered free slot.
    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    /// Place a fresh, runnable entry in `slot`. Returns false if the slot is taken.
    pub fn admit(&mut self, slot: usize, worker: WorkerId, now: SimTime) -> bool {
        match self.slots.get_mut(slot) {
            Some(cell) if cell.is_none() => {
                *cell = Some(ProcessEntry::new(worker, now));
                self.occupied += 1;
                true
            }
            _ => false,
        }
    }

    /// Free a slot, returning the entry that occupied it.
    pub fn release(&mut self, slot: usize) -> Option<ProcessEntry> {
        let entry = self.slots.get_mut(slot)?.take()?;
        self.occupied -= 1;
        Some(entry)
    }

    pub fn get(&self, slot: usize) -> Option<&ProcessEntry> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut ProcessEntry> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ProcessEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|e| (i, e)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut ProcessEntry)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|e| (i, e)))
    }

    /// Earliest wake-up time among blocked entries.
    pub fn earliest_unblock(&self) -> Option<SimTime> {
        self.iter()
            .filter(|(_, e)| e.blocked)
            .map(|(_, e)| e.blocked_until)
            .min()
    }

    pub fn views(&self) -> Vec<SlotView> {
        self.iter()
            .map(|(slot, e)| SlotView {
                slot,
                worker: e.worker,
                blocked: e.blocked,
                service_time: e.service_time,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_and_release() {
        let mut table = ProcessTable::new(2);
        assert_eq!(table.free_slot(), Some(0));
        assert!(table.admit(0, WorkerId(10), SimTime::ZERO));
        assert!(!table.admit(0, WorkerId(11), SimTime::ZERO));
        assert_eq!(table.free_slot(), Some(1));
        assert!(table.admit(1, WorkerId(11), SimTime::ZERO));
        assert!(table.is_full());
        assert_eq!(table.free_slot(), None);

        let released = table.release(0).unwrap();
        assert_eq!(released.worker, WorkerId(10));
        assert_eq!(table.occupied(), 1);
        assert_eq!(table.get(1).map(|e| e.worker), Some(WorkerId(11)));
        assert!(table.get(0).is_none());
    }

    #[test]
    fn test_out_of_range_slot() {
        let mut table = ProcessTable::new(1);
        assert!(!table.admit(5, WorkerId(1), SimTime::ZERO));
        assert!(table.release(5).is_none());
    }

    #[test]
    fn test_earliest_unblock() {
        let mut table = ProcessTable::new(3);
        for slot in 0..3 {
            table.admit(slot, WorkerId(slot as u64), SimTime::ZERO);
        }
        assert_eq!(table.earliest_unblock(), None);
        for (slot, secs) in [(0usize, 5u64), (2, 3)] {
            let entry = table.get_mut(slot).unwrap();
            entry.blocked = true;
            entry.blocked_until = SimTime::new(secs, 0);
        }
        assert_eq!(table.earliest_unblock(), Some(SimTime::new(3, 0)));
    }
}
