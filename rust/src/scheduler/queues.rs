//! Three-level feedback queues over fixed-capacity rings of slot indices.

use thiserror::Error;

use crate::models::{Level, QueueCursor};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{level} queue is full (capacity {capacity})")]
pub struct QueueFull {
    pub level: Level,
    pub capacity: usize,
}

/// Circular buffer of slot indices. Empty iff `head == tail`, so one cell is
/// always left unused.
#[derive(Clone, Debug)]
pub struct SlotRing {
    cells: Box<[usize]>,
    head: usize,
    tail: usize,
}

impl SlotRing {
    /// Ring able to hold `capacity` indices at once.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: vec![0; capacity + 1].into_boxed_slice(),
            head: 0,
            tail: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn len(&self) -> usize {
        (self.tail + self.cells.len() - self.head) % self.cells.len()
    }

    pub fn capacity(&self) -> usize {
        self.cells.len() - 1
    }

    /// Append at the tail. Returns the index back if the ring is full.
    pub fn push(&mut self, slot: usize) -> Result<(), usize> {
        let next = (self.tail + 1) % self.cells.len();
        if next == self.head {
            return Err(slot);
        }
        self.cells[self.tail] = slot;
        self.tail = next;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let slot = self.cells[self.head];
        self.head = (self.head + 1) % self.cells.len();
        Some(slot)
    }

    /// Queued indices from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let len = self.cells.len();
        (0..self.len()).map(move |i| self.cells[(self.head + i) % len])
    }

    pub fn cursors(&self) -> (usize, usize) {
        (self.head, self.tail)
    }
}

/// High, mid and low rings. FIFO within a level is the only ordering.
#[derive(Clone, Debug)]
pub struct FeedbackQueues {
    rings: [SlotRing; 3],
}

impl FeedbackQueues {
    pub fn new(slots: usize) -> Self {
        Self {
            rings: [
                SlotRing::with_capacity(slots),
                SlotRing::with_capacity(slots),
                SlotRing::with_capacity(slots),
            ],
        }
    }

    pub fn push(&mut self, level: Level, slot: usize) -> Result<(), QueueFull> {
        let ring = &mut self.rings[level.index()];
        let capacity = ring.capacity();
        ring.push(slot).map_err(|_| QueueFull { level, capacity })
    }

    /// Pop from the highest non-empty level. Lower levels are never looked at
    /// while a higher one has work.
    pub fn pop_next(&mut self) -> Option<(Level, usize)> {
        for level in Level::ALL {
            if let Some(slot) = self.rings[level.index()].pop() {
                return Some((level, slot));
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.rings.iter().all(SlotRing::is_empty)
    }

    pub fn level(&self, level: Level) -> &SlotRing {
        &self.rings[level.index()]
    }

    /// Level holding `slot`, if any.
    pub fn find(&self, slot: usize) -> Option<Level> {
        Level::ALL
            .into_iter()
            .find(|level| self.rings[level.index()].iter().any(|s| s == slot))
    }

    pub fn cursors(&self) -> [QueueCursor; 3] {
        Level::ALL.map(|level| {
            let (head, tail) = self.rings[level.index()].cursors();
            QueueCursor { level, head, tail }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_wraps_and_reports_full() {
        let mut ring = SlotRing::with_capacity(2);
        assert!(ring.is_empty());
        ring.push(4).unwrap();
        ring.push(5).unwrap();
        assert_eq!(ring.push(6), Err(6));
        assert_eq!(ring.pop(), Some(4));
        ring.push(6).unwrap();
        assert_eq!(ring.iter().collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(ring.pop(), Some(5));
        assert_eq!(ring.pop(), Some(6));
        assert_eq!(ring.pop(), None);
        let (head, tail) = ring.cursors();
        assert_eq!(head, tail);
    }

    #[test]
    fn test_pop_respects_priority_then_fifo() {
        let mut queues = FeedbackQueues::new(4);
        queues.push(Level::Low, 0).unwrap();
        queues.push(Level::Mid, 1).unwrap();
        queues.push(Level::High, 2).unwrap();
        queues.push(Level::High, 3).unwrap();

        assert_eq!(queues.pop_next(), Some((Level::High, 2)));
        assert_eq!(queues.pop_next(), Some((Level::High, 3)));
        assert_eq!(queues.pop_next(), Some((Level::Mid, 1)));
        assert_eq!(queues.pop_next(), Some((Level::Low, 0)));
        assert_eq!(queues.pop_next(), None);
        assert!(queues.is_empty());
    }

    #[test]
    fn test_find_and_cursors() {
        let mut queues = FeedbackQueues::new(3);
        queues.push(Level::Mid, 2).unwrap();
        assert_eq!(queues.find(2), Some(Level::Mid));
        assert_eq!(queues.find(1), None);
        let cursors = queues.cursors();
        assert_eq!(cursors[1].level, Level::Mid);
        assert_eq!((cursors[1].head, cursors[1].tail), (0, 1));
        assert_eq!((cursors[0].head, cursors[0].tail), (0, 0));
    }

    #[test]
    fn test_every_slot_fits() {
        let mut queues = FeedbackQueues::new(18);
        for slot in 0..18 {
            queues.push(Level::High, slot).unwrap();
        }
        assert_eq!(
            queues.push(Level::High, 0),
            Err(QueueFull {
                level: Level::High,
                capacity: 18
            })
        );
    }
}
