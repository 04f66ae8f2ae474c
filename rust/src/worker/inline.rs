//! Deterministic in-process transport.
//!
//! Policies run synchronously when granted. Replies land in a single outbox
//! and are picked out by recipient, so an await for one worker never consumes
//! another worker's reply.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use super::{Message, Reply, TransportError, WorkerId, WorkerPolicy, WorkerTransport};
use crate::shutdown::ShutdownToken;

struct InlineWorker<P> {
    policy: P,
    /// Set once the worker reported termination or was told to exit
    exited: bool,
}

/// Single-threaded transport driving policies built by a factory.
pub struct InlineWorkers<P, F>
where
    F: FnMut(WorkerId) -> P,
{
    factory: F,
    workers: FxHashMap<WorkerId, InlineWorker<P>>,
    outbox: VecDeque<Message>,
    next_id: u64,
}

impl<P, F> InlineWorkers<P, F>
where
    P: WorkerPolicy,
    F: FnMut(WorkerId) -> P,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            workers: FxHashMap::default(),
            outbox: VecDeque::new(),
            next_id: 1,
        }
    }
}

impl<P, F> WorkerTransport for InlineWorkers<P, F>
where
    P: WorkerPolicy,
    F: FnMut(WorkerId) -> P,
{
    fn spawn(&mut self) -> Result<WorkerId, TransportError> {
        let id = WorkerId(self.next_id);
        self.next_id += 1;
        let policy = (self.factory)(id);
        self.workers.insert(
            id,
            InlineWorker {
                policy,
                exited: false,
            },
        );
        Ok(id)
    }

    fn grant(&mut self, worker: WorkerId, quantum: i64) -> Result<(), TransportError> {
        let entry = match self.workers.get_mut(&worker) {
            Some(w) if !w.exited => w,
            _ => return Err(TransportError::UnknownWorker(worker)),
        };
        let payload = entry.policy.respond(quantum);
        if payload < 0 {
            entry.exited = true;
        }
        self.outbox.push_back(Message {
            recipient: worker,
            payload,
        });
        Ok(())
    }

    /// Replies are produced at grant time, so there is never anything to
    /// wait for and shutdown cannot interrupt.
    fn await_report(
        &mut self,
        worker: WorkerId,
        _shutdown: &ShutdownToken,
    ) -> Result<Reply, TransportError> {
        let pos = self
            .outbox
            .iter()
            .position(|m| m.recipient == worker)
            .ok_or(TransportError::NoReply(worker))?;
        self.outbox
            .remove(pos)
            .map(|m| Reply::Payload(m.payload))
            .ok_or(TransportError::NoReply(worker))
    }

    fn reap(&mut self, worker: WorkerId) -> Result<(), TransportError> {
        self.workers
            .remove(&worker)
            .map(|_| ())
            .ok_or(TransportError::UnknownWorker(worker))
    }

    fn terminate_all(&mut self) {
        for worker in self.workers.values_mut() {
            worker.exited = true;
        }
        self.workers.clear();
        self.outbox.clear();
    }

    fn live_workers(&self) -> usize {
        self.workers.values().filter(|w| !w.exited).count()
    }
}
