//! Scheduling event sinks.
//!
//! Observers only watch; nothing they do feeds back into dispatch decisions.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::clock::SimTime;
use crate::models::{Level, Snapshot};
use crate::worker::WorkerId;
use crate::{log_changes, log_checks, log_debug};

/// Something the dispatcher did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedEvent {
    Admitted {
        at: SimTime,
        worker: WorkerId,
        slot: usize,
    },
    /// Arrival was due but the table was full or the spawn cap reached
    AdmissionDeferred { at: SimTime, next_arrival: SimTime },
    Dispatched {
        at: SimTime,
        worker: WorkerId,
        slot: usize,
        level: Level,
        quantum: i64,
        waited: SimTime,
    },
    Requeued {
        at: SimTime,
        worker: WorkerId,
        from: Level,
        to: Level,
    },
    Blocked {
        at: SimTime,
        worker: WorkerId,
        consumed: u64,
        until: SimTime,
    },
    Unblocked {
        at: SimTime,
        worker: WorkerId,
        slot: usize,
    },
    Terminated {
        at: SimTime,
        worker: WorkerId,
        consumed: u64,
        service_time: SimTime,
    },
    /// Nothing runnable; clock jumped straight from `from` to `to`
    Idle { from: SimTime, to: SimTime },
    Snapshot(Snapshot),
    Shutdown { at: SimTime, live: usize },
}

pub trait Observer {
    fn observe(&mut self, event: &SchedEvent);
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn observe(&mut self, event: &SchedEvent) {
        (**self).observe(event)
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn observe(&mut self, _event: &SchedEvent) {}
}

/// Renders events to stderr through the verbosity macros.
#[derive(Clone, Copy, Debug)]
pub struct LogObserver {
    verbosity: u8,
}

impl LogObserver {
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }

    fn log_snapshot(&self, snapshot: &Snapshot) {
        let verbosity = self.verbosity;
        log_changes!(verbosity, "[{}] process table:", snapshot.clock);
        for view in &snapshot.slots {
            log_changes!(
                verbosity,
                "  slot {:>2}  {:<5} blocked={:<5} service={}",
                view.slot,
                view.worker.to_string(),
                view.blocked,
                view.service_time
            );
        }
        for cursor in &snapshot.cursors {
            log_changes!(
                verbosity,
                "  {:<4} queue head={} tail={}",
                cursor.level.to_string(),
                cursor.head,
                cursor.tail
            );
        }
    }
}

impl Observer for LogObserver {
    fn observe(&mut self, event: &SchedEvent) {
        let verbosity = self.verbosity;
        match event {
            SchedEvent::Admitted { at, worker, slot } => {
                log_changes!(verbosity, "[{}] admitted {} into slot {}", at, worker, slot);
            }
            SchedEvent::AdmissionDeferred { at, next_arrival } => {
                log_checks!(
                    verbosity,
                    "[{}] admission deferred, next check at {}",
                    at,
                    next_arrival
                );
            }
            SchedEvent::Dispatched {
                at,
                worker,
                slot,
                level,
                quantum,
                waited,
            } => {
                log_checks!(
                    verbosity,
                    "[{}] dispatching {} (slot {}) from {} queue, quantum {} ns, waited {}",
                    at,
                    worker,
                    slot,
                    level,
                    quantum,
                    waited
                );
            }
            SchedEvent::Requeued {
                at,
                worker,
                from,
                to,
            } => {
                log_checks!(
                    verbosity,
                    "[{}] {} used full quantum, {} -> {}",
                    at,
                    worker,
                    from,
                    to
                );
            }
            SchedEvent::Blocked {
                at,
                worker,
                consumed,
                until,
            } => {
                log_changes!(
                    verbosity,
                    "[{}] {} used {} ns and blocked until {}",
                    at,
                    worker,
                    consumed,
                    until
                );
            }
            SchedEvent::Unblocked { at, worker, slot } => {
                log_checks!(
                    verbosity,
                    "[{}] {} (slot {}) unblocked into high queue",
                    at,
                    worker,
                    slot
                );
            }
            SchedEvent::Terminated {
                at,
                worker,
                consumed,
                service_time,
            } => {
                log_changes!(
                    verbosity,
                    "[{}] {} terminated after {} ns, total service {}",
                    at,
                    worker,
                    consumed,
                    service_time
                );
            }
            SchedEvent::Idle { from, to } => {
                log_debug!(verbosity, "[{}] idle, advancing clock to {}", from, to);
            }
            SchedEvent::Snapshot(snapshot) => self.log_snapshot(snapshot),
            SchedEvent::Shutdown { at, live } => {
                log_changes!(
                    verbosity,
                    "[{}] shutdown requested, terminating {} live workers",
                    at,
                    live
                );
            }
        }
    }
}

/// Collects every event. Clones share the same buffer, so one handle can be
/// given to the dispatcher and another read afterwards.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<SchedEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SchedEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&SchedEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Observer for RecordingObserver {
    fn observe(&mut self, event: &SchedEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_clones_share_buffer() {
        let recorder = RecordingObserver::new();
        let mut handle = recorder.clone();
        handle.observe(&SchedEvent::Idle {
            from: SimTime::ZERO,
            to: SimTime::new(2, 0),
        });
        assert_eq!(recorder.events().len(), 1);
        assert_eq!(
            recorder.count(|e| matches!(e, SchedEvent::Idle { .. })),
            1
        );
        recorder.clear();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_log_observer_accepts_every_event() {
        let mut observer = LogObserver::new(crate::logging::VERBOSITY_SILENT);
        observer.observe(&SchedEvent::Shutdown {
            at: SimTime::ZERO,
            live: 0,
        });
        NullObserver.observe(&SchedEvent::Shutdown {
            at: SimTime::ZERO,
            live: 0,
        });
    }
}
