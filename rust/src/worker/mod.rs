//! Worker capability boundary: identities, messages, and transports.
//!
//! The dispatcher never touches a worker directly. It spawns, grants,
//! awaits, and reaps through a [`WorkerTransport`]; the worker's own
//! decision is a [`WorkerPolicy`].

mod inline;
mod policy;
mod report;
mod threaded;

use std::fmt;
use thiserror::Error;

use crate::shutdown::ShutdownToken;

pub use inline::InlineWorkers;
pub use policy::{RandomPolicy, ScriptStep, ScriptedPolicy};
pub use report::{ProtocolError, Report};
pub use threaded::ThreadedWorkers;

/// Opaque, addressable worker identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Addressed message. A receive for `X` only observes messages whose
/// recipient is `X`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message {
    pub recipient: WorkerId,
    pub payload: i64,
}

/// What the scheduler can tell a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Run for at most this many nanoseconds
    Grant(i64),
    /// Exit now
    Terminate,
}

/// Worker-side decision: given a quantum, produce the report payload.
///
/// Positive and equal to the quantum means the quantum was exhausted,
/// positive and smaller means the worker blocks, negative means the worker
/// terminates having consumed `abs(payload)`.
pub trait WorkerPolicy {
    fn respond(&mut self, quantum: i64) -> i64;
}

impl<P: WorkerPolicy + ?Sized> WorkerPolicy for Box<P> {
    fn respond(&mut self, quantum: i64) -> i64 {
        (**self).respond(quantum)
    }
}

/// What came back while awaiting one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    Payload(i64),
    /// Shutdown fired before the worker answered
    Cancelled,
}

/// Transport failures. Every one of these is fatal to the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
    #[error("no such worker: {0}")]
    UnknownWorker(WorkerId),
    #[error("worker {0} disconnected")]
    Disconnected(WorkerId),
    #[error("no reply from worker {0}")]
    NoReply(WorkerId),
    #[error("reply addressed to {got} while awaiting {expected}")]
    Misaddressed { expected: WorkerId, got: WorkerId },
    #[error("worker {0} panicked")]
    Panicked(WorkerId),
}

/// Spawn, address, and reap workers.
///
/// Exactly one request may be in flight per worker: `grant` followed by
/// `await_report` for the same identity.
pub trait WorkerTransport {
    /// Create and start a worker, returning its address.
    fn spawn(&mut self) -> Result<WorkerId, TransportError>;

    /// Send a quantum to one worker.
    fn grant(&mut self, worker: WorkerId, quantum: i64) -> Result<(), TransportError>;

    /// Block until `worker` replies or `shutdown` fires. Replies for other
    /// workers are not consumed.
    fn await_report(
        &mut self,
        worker: WorkerId,
        shutdown: &ShutdownToken,
    ) -> Result<Reply, TransportError>;

    /// Wait for a worker that reported termination to fully exit.
    fn reap(&mut self, worker: WorkerId) -> Result<(), TransportError>;

    /// Best-effort termination of every live worker. Used on shutdown and on
    /// fatal errors.
    fn terminate_all(&mut self);

    fn live_workers(&self) -> usize;
}
