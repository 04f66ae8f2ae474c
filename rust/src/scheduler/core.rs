//! Core MLFQ dispatcher.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::clock::SimTime;
use crate::config::{ConfigError, SimulationConfig};
use crate::models::{Level, RunSummary};
use crate::observer::{Observer, SchedEvent};
use crate::shutdown::ShutdownToken;
use crate::worker::{ProtocolError, Reply, Report, TransportError, WorkerId, WorkerTransport};
use crate::{log_changes, log_checks, log_debug, log_fatal};

use super::queues::{FeedbackQueues, QueueFull};
use super::state::SchedulerState;
use super::stats::RunStats;

/// Errors that end a run. None of them are retried.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Worker transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Protocol violation by {worker}: {source}")]
    Protocol {
        worker: WorkerId,
        #[source]
        source: ProtocolError,
    },
    #[error("Queue overflow: {0}")]
    QueueOverflow(#[from] QueueFull),
    #[error("Slot {0} is not occupied")]
    EmptySlot(usize),
    #[error("Slot {0} is already occupied")]
    SlotTaken(usize),
}

/// What one loop iteration did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Dispatched,
    /// Nothing runnable; the clock jumped to the next arrival or wake-up
    Idle,
    /// Lifetime cap reached and every process has terminated
    Finished,
    Cancelled,
}

/// RNG for a run: seeded when a seed is configured, OS entropy otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Single-threaded MLFQ control loop.
///
/// Owns the clock, table and queues outright. Exactly one handshake is open
/// at a time and the only place it waits is on the reply to that handshake.
pub struct Dispatcher<W, O, R> {
    config: SimulationConfig,
    state: SchedulerState,
    stats: RunStats,
    workers: W,
    observer: O,
    rng: R,
    shutdown: ShutdownToken,
    /// Clock value of the last snapshot taken for an event
    event_snapshot_at: Option<SimTime>,
}

impl<W, O, R> Dispatcher<W, O, R>
where
    W: WorkerTransport,
    O: Observer,
    R: Rng,
{
    /// Validate the configuration and set up empty state.
    pub fn new(
        config: SimulationConfig,
        workers: W,
        observer: O,
        rng: R,
        shutdown: ShutdownToken,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let state = SchedulerState::new(config.table_capacity);
        Ok(Self {
            config,
            state,
            stats: RunStats::default(),
            workers,
            observer,
            rng,
            shutdown,
            event_snapshot_at: None,
        })
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn workers(&self) -> &W {
        &self.workers
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Quantum granted at `level`: Q0, 2*Q0 or 4*Q0.
    pub fn quantum_for(&self, level: Level) -> i64 {
        (self.config.base_quantum_ns * level.quantum_multiplier()) as i64
    }

    pub fn is_finished(&self) -> bool {
        self.state.total_spawned >= self.config.lifetime_cap && self.state.population == 0
    }

    /// Loop until every process has run to completion or shutdown is requested.
    ///
    /// Workers are terminated on every exit path, fatal ones included.
    pub fn run(&mut self) -> Result<RunSummary, SchedulerError> {
        loop {
            match self.step() {
                Ok(Step::Dispatched) | Ok(Step::Idle) => continue,
                Ok(Step::Finished) => {
                    self.workers.terminate_all();
                    log_changes!(
                        self.config.verbosity,
                        "[{}] all {} processes finished",
                        self.state.now(),
                        self.state.total_spawned
                    );
                    return Ok(self.summary(false));
                }
                Ok(Step::Cancelled) => {
                    self.shut_down();
                    return Ok(self.summary(true));
                }
                Err(err) => {
                    log_fatal!("[{}] {}", self.state.now(), err);
                    self.workers.terminate_all();
                    return Err(err);
                }
            }
        }
    }

    /// One loop iteration: unblock scan, arrival, selection, then either a
    /// handshake or an idle jump.
    pub fn step(&mut self) -> Result<Step, SchedulerError> {
        if self.shutdown.is_triggered() {
            return Ok(Step::Cancelled);
        }

        self.unblock_ready()?;
        self.admit_arrival()?;

        if self.is_finished() {
            return Ok(Step::Finished);
        }

        let step = match self.state.queues.pop_next() {
            Some((level, slot)) => self.dispatch(level, slot)?,
            None => {
                self.idle_advance();
                Step::Idle
            }
        };
        if step == Step::Cancelled {
            return Ok(step);
        }

        self.maybe_snapshot();
        Ok(step)
    }

    /// Move every blocked entry whose wait has elapsed back to the high queue.
    fn unblock_ready(&mut self) -> Result<(), SchedulerError> {
        let now = self.state.now();
        let mut woken = Vec::new();
        for (slot, entry) in self.state.table.iter_mut() {
            if entry.blocked && entry.blocked_until <= now {
                entry.blocked = false;
                entry.ready_since = now;
                woken.push((slot, entry.worker));
            }
        }
        for (slot, worker) in woken {
            self.state.queues.push(Level::High, slot)?;
            self.observer
                .observe(&SchedEvent::Unblocked { at: now, worker, slot });
        }
        Ok(())
    }

    /// Admit one new process if an arrival is due and there is room.
    ///
    /// The next arrival is rescheduled whether or not a slot was free; a full
    /// table just loses this opportunity.
    fn admit_arrival(&mut self) -> Result<(), SchedulerError> {
        let now = self.state.now();
        if now < self.state.next_arrival {
            return Ok(());
        }

        let cap_reached = self.state.total_spawned >= self.config.lifetime_cap;
        let free_slot = if cap_reached {
            None
        } else {
            self.state.table.free_slot()
        };

        let delay = SimTime::new(
            self.rng.gen_range(0..=self.config.arrival_max_secs),
            self.rng.gen_range(0..=self.config.arrival_max_ns),
        );
        self.state.next_arrival = now + delay;

        let slot = match free_slot {
            Some(slot) => slot,
            None => {
                if !cap_reached {
                    self.observer.observe(&SchedEvent::AdmissionDeferred {
                        at: now,
                        next_arrival: self.state.next_arrival,
                    });
                }
                return Ok(());
            }
        };

        let worker = self.workers.spawn()?;
        if !self.state.table.admit(slot, worker, now) {
            return Err(SchedulerError::SlotTaken(slot));
        }
        self.state.queues.push(Level::High, slot)?;
        self.state.total_spawned += 1;
        self.state.population += 1;
        self.observer
            .observe(&SchedEvent::Admitted { at: now, worker, slot });
        self.snapshot_event();
        Ok(())
    }

    /// Run one handshake with the worker in `slot` and apply its report.
    ///
    /// Returns `Step::Cancelled` if shutdown fires while awaiting the reply;
    /// the slot is then left running for `shut_down` to release.
    fn dispatch(&mut self, level: Level, slot: usize) -> Result<Step, SchedulerError> {
        let verbosity = self.config.verbosity;
        let quantum = self.quantum_for(level);
        let (worker, ready_since) = match self.state.table.get(slot) {
            Some(entry) => (entry.worker, entry.ready_since),
            None => return Err(SchedulerError::EmptySlot(slot)),
        };
        self.state.running = Some(slot);

        let overhead = self
            .rng
            .gen_range(self.config.overhead_min_ns..=self.config.overhead_max_ns);
        self.state.clock.advance(0, overhead);
        self.stats.overhead = self.stats.overhead + SimTime::from_nanos(overhead);
        log_debug!(verbosity, "  dispatch overhead {} ns", overhead);

        let now = self.state.now();
        let waited = now.saturating_sub(ready_since);
        self.stats.total_wait = self.stats.total_wait + waited;
        self.stats.dispatches += 1;
        self.observer.observe(&SchedEvent::Dispatched {
            at: now,
            worker,
            slot,
            level,
            quantum,
            waited,
        });
        self.snapshot_event();

        self.workers.grant(worker, quantum)?;
        let payload = match self.workers.await_report(worker, &self.shutdown)? {
            Reply::Payload(payload) => payload,
            Reply::Cancelled => {
                log_changes!(verbosity, "[{}] cancelled while awaiting {}", now, worker);
                return Ok(Step::Cancelled);
            }
        };
        log_debug!(verbosity, "  {} replied {}", worker, payload);
        let report = Report::decode(payload, quantum)
            .map_err(|source| SchedulerError::Protocol { worker, source })?;

        let consumed = report.consumed();
        self.state.clock.advance(0, consumed);
        self.stats.consumed = self.stats.consumed + SimTime::from_nanos(consumed);
        let now = self.state.now();

        let entry = self
            .state
            .table
            .get_mut(slot)
            .ok_or(SchedulerError::EmptySlot(slot))?;
        entry.service_time = entry.service_time + SimTime::from_nanos(consumed);

        match report {
            Report::Exhausted { .. } => {
                let to = level.demote();
                entry.ready_since = now;
                self.state.queues.push(to, slot)?;
                self.observer.observe(&SchedEvent::Requeued {
                    at: now,
                    worker,
                    from: level,
                    to,
                });
            }
            Report::Yielded { consumed } => {
                let wait = SimTime::from_nanos(
                    self.rng
                        .gen_range(self.config.block_wait_min_ns..=self.config.block_wait_max_ns),
                );
                entry.blocked = true;
                entry.blocked_until = now + wait;
                let until = entry.blocked_until;
                self.stats.total_blocked = self.stats.total_blocked + wait;
                self.observer.observe(&SchedEvent::Blocked {
                    at: now,
                    worker,
                    consumed,
                    until,
                });
            }
            Report::Terminated { consumed } => {
                let service_time = entry.service_time;
                self.workers.reap(worker)?;
                self.state.table.release(slot);
                self.state.population -= 1;
                self.observer.observe(&SchedEvent::Terminated {
                    at: now,
                    worker,
                    consumed,
                    service_time,
                });
            }
        }

        self.state.running = None;
        Ok(Step::Dispatched)
    }

    /// Jump the clock to the earliest of the next arrival and the earliest
    /// wake-up. Arrivals only count while the lifetime cap allows spawning.
    fn idle_advance(&mut self) {
        let from = self.state.now();
        let arrival = (self.state.total_spawned < self.config.lifetime_cap)
            .then_some(self.state.next_arrival);
        let target = [arrival, self.state.table.earliest_unblock()]
            .into_iter()
            .flatten()
            .min();

        match target {
            Some(to) if to > from => {
                self.state.clock.advance_to(to);
                self.stats.idle = self.stats.idle + to.saturating_sub(from);
                self.observer.observe(&SchedEvent::Idle { from, to });
                self.snapshot_event();
            }
            Some(_) => {
                log_checks!(
                    self.config.verbosity,
                    "[{}] next event already due, retrying selection",
                    from
                );
            }
            None => {
                log_checks!(self.config.verbosity, "[{}] nothing left to wait for", from);
            }
        }
    }

    /// Table and queue snapshot following an admission, dispatch or idle jump.
    fn snapshot_event(&mut self) {
        let snapshot = self.state.snapshot();
        self.event_snapshot_at = Some(snapshot.clock);
        self.observer.observe(&SchedEvent::Snapshot(snapshot));
    }

    /// Periodic snapshot. Skipped when an event already produced one at this
    /// instant, but the interval still restarts.
    fn maybe_snapshot(&mut self) {
        let now = self.state.now();
        if now.saturating_sub(self.state.last_snapshot) < self.config.snapshot_interval() {
            return;
        }
        self.state.last_snapshot = now;
        if self.event_snapshot_at != Some(now) {
            let snapshot = self.state.snapshot();
            self.observer.observe(&SchedEvent::Snapshot(snapshot));
        }
    }

    /// Terminate every live worker and free the table. No handshake is drained.
    fn shut_down(&mut self) {
        let at = self.state.now();
        let live = self.workers.live_workers();
        self.observer.observe(&SchedEvent::Shutdown { at, live });
        self.workers.terminate_all();

        let occupied: Vec<usize> = self.state.table.iter().map(|(slot, _)| slot).collect();
        for slot in occupied {
            self.state.table.release(slot);
        }
        self.state.queues = FeedbackQueues::new(self.config.table_capacity);
        self.state.running = None;
        self.state.population = 0;
    }

    fn summary(&self, cancelled: bool) -> RunSummary {
        self.stats.summarize(
            self.state.total_spawned,
            self.state.now(),
            cancelled,
            self.shutdown.started_at(),
            Utc::now(),
        )
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut SchedulerState {
        &mut self.state
    }
}
