//! One OS thread per worker.
//!
//! Each worker owns a private directive channel and a private reply channel,
//! so a receive is scoped to one address by construction.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rustc_hash::FxHashMap;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{Directive, Message, Reply, TransportError, WorkerId, WorkerPolicy, WorkerTransport};
use crate::shutdown::ShutdownToken;

/// How often a pending await re-checks the shutdown token.
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// How long teardown waits for worker threads before detaching them.
const EXIT_GRACE: Duration = Duration::from_millis(250);

struct WorkerLink {
    directives: Sender<Directive>,
    replies: Receiver<Message>,
    handle: Option<JoinHandle<()>>,
}

/// Transport backed by real threads. Dropping it terminates every worker.
pub struct ThreadedWorkers<P, F>
where
    F: FnMut(WorkerId) -> P,
{
    factory: F,
    links: FxHashMap<WorkerId, WorkerLink>,
    next_id: u64,
}

impl<P, F> ThreadedWorkers<P, F>
where
    P: WorkerPolicy + Send + 'static,
    F: FnMut(WorkerId) -> P,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            links: FxHashMap::default(),
            next_id: 1,
        }
    }

    fn link(&self, worker: WorkerId) -> Result<&WorkerLink, TransportError> {
        self.links
            .get(&worker)
            .ok_or(TransportError::UnknownWorker(worker))
    }
}

/// Worker thread body: serve grants until told to stop or until reporting
/// termination.
fn run_worker<P: WorkerPolicy>(
    id: WorkerId,
    mut policy: P,
    directives: Receiver<Directive>,
    replies: Sender<Message>,
) {
    while let Ok(directive) = directives.recv() {
        let quantum = match directive {
            Directive::Grant(quantum) => quantum,
            Directive::Terminate => break,
        };
        let payload = policy.respond(quantum);
        if replies
            .send(Message {
                recipient: id,
                payload,
            })
            .is_err()
            || payload < 0
        {
            break;
        }
    }
}

/// Tell every worker to exit, close its channels, and join it.
///
/// A worker stuck inside its policy cannot see the directive. Once the grace
/// period is over its handle is dropped, detaching the thread; it exits on
/// its own when its next reply hits the closed channel.
fn release_links(links: Vec<WorkerLink>) {
    let mut handles = Vec::with_capacity(links.len());
    for mut link in links {
        // A worker that already exited has dropped its receiver
        let _ = link.directives.try_send(Directive::Terminate);
        handles.extend(link.handle.take());
    }

    let deadline = Instant::now() + EXIT_GRACE;
    for handle in handles {
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        if handle.is_finished() {
            let _ = handle.join();
        }
    }
}

impl<P, F> WorkerTransport for ThreadedWorkers<P, F>
where
    P: WorkerPolicy + Send + 'static,
    F: FnMut(WorkerId) -> P,
{
    fn spawn(&mut self) -> Result<WorkerId, TransportError> {
        let id = WorkerId(self.next_id);
        self.next_id += 1;

        // One request in flight per worker, so a single slot each way suffices
        let (directive_tx, directive_rx) = bounded(1);
        let (reply_tx, reply_rx) = bounded(1);
        let policy = (self.factory)(id);

        let handle = thread::Builder::new()
            .name(format!("mlfq-worker-{}", id.0))
            .spawn(move || run_worker(id, policy, directive_rx, reply_tx))
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        self.links.insert(
            id,
            WorkerLink {
                directives: directive_tx,
                replies: reply_rx,
                handle: Some(handle),
            },
        );
        Ok(id)
    }

    fn grant(&mut self, worker: WorkerId, quantum: i64) -> Result<(), TransportError> {
        self.link(worker)?
            .directives
            .send(Directive::Grant(quantum))
            .map_err(|_| TransportError::Disconnected(worker))
    }

    fn await_report(
        &mut self,
        worker: WorkerId,
        shutdown: &ShutdownToken,
    ) -> Result<Reply, TransportError> {
        let replies = &self.link(worker)?.replies;
        let message = loop {
            match replies.recv_timeout(SHUTDOWN_POLL) {
                Ok(message) => break message,
                Err(RecvTimeoutError::Timeout) => {
                    if shutdown.is_triggered() {
                        return Ok(Reply::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TransportError::Disconnected(worker))
                }
            }
        };
        if message.recipient != worker {
            return Err(TransportError::Misaddressed {
                expected: worker,
                got: message.recipient,
            });
        }
        Ok(Reply::Payload(message.payload))
    }

    fn reap(&mut self, worker: WorkerId) -> Result<(), TransportError> {
        let mut link = self
            .links
            .remove(&worker)
            .ok_or(TransportError::UnknownWorker(worker))?;
        match link.handle.take() {
            Some(handle) => handle.join().map_err(|_| TransportError::Panicked(worker)),
            None => Ok(()),
        }
    }

    fn terminate_all(&mut self) {
        release_links(self.links.drain().map(|(_, link)| link).collect());
    }

    fn live_workers(&self) -> usize {
        self.links.len()
    }
}

impl<P, F> Drop for ThreadedWorkers<P, F>
where
    F: FnMut(WorkerId) -> P,
{
    fn drop(&mut self) {
        release_links(self.links.drain().map(|(_, link)| link).collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{ScriptStep, ScriptedPolicy};

    fn scripted(steps: Vec<ScriptStep>) -> impl FnMut(WorkerId) -> ScriptedPolicy {
        move |_| ScriptedPolicy::new(steps.clone())
    }

    /// Takes far longer than any test waits before answering.
    struct Stalled;

    impl WorkerPolicy for Stalled {
        fn respond(&mut self, quantum: i64) -> i64 {
            thread::sleep(Duration::from_secs(3));
            quantum
        }
    }

    #[test]
    fn test_grant_and_report_per_worker() {
        let token = ShutdownToken::new();
        let mut workers =
            ThreadedWorkers::new(scripted(vec![ScriptStep::Full, ScriptStep::Partial(40)]));
        let a = workers.spawn().unwrap();
        let b = workers.spawn().unwrap();

        workers.grant(a, 1_000).unwrap();
        workers.grant(b, 2_000).unwrap();
        // Collect out of order: each await only sees its own worker's reply
        assert_eq!(workers.await_report(b, &token), Ok(Reply::Payload(2_000)));
        assert_eq!(workers.await_report(a, &token), Ok(Reply::Payload(1_000)));

        workers.grant(a, 1_000).unwrap();
        assert_eq!(workers.await_report(a, &token), Ok(Reply::Payload(400)));
        assert_eq!(workers.live_workers(), 2);
    }

    #[test]
    fn test_reap_after_termination() {
        let token = ShutdownToken::new();
        let mut workers = ThreadedWorkers::new(scripted(vec![ScriptStep::Terminate(25)]));
        let a = workers.spawn().unwrap();
        workers.grant(a, 1_000).unwrap();
        assert_eq!(workers.await_report(a, &token), Ok(Reply::Payload(-250)));
        workers.reap(a).unwrap();
        assert_eq!(workers.live_workers(), 0);
        assert_eq!(
            workers.grant(a, 1_000),
            Err(TransportError::UnknownWorker(a))
        );
    }

    #[test]
    fn test_exited_worker_reports_disconnect() {
        let token = ShutdownToken::new();
        let mut workers = ThreadedWorkers::new(scripted(vec![ScriptStep::Terminate(10)]));
        let a = workers.spawn().unwrap();
        workers.grant(a, 100).unwrap();
        assert_eq!(workers.await_report(a, &token), Ok(Reply::Payload(-10)));
        // Not reaped yet: the thread is gone, so the next handshake fails
        let handshake = workers
            .grant(a, 100)
            .and_then(|_| workers.await_report(a, &token));
        assert_eq!(handshake, Err(TransportError::Disconnected(a)));
    }

    #[test]
    fn test_terminate_all_joins_workers() {
        let mut workers = ThreadedWorkers::new(scripted(vec![]));
        for _ in 0..4 {
            workers.spawn().unwrap();
        }
        workers.terminate_all();
        assert_eq!(workers.live_workers(), 0);
    }

    #[test]
    fn test_shutdown_interrupts_pending_await() {
        let token = ShutdownToken::new();
        let mut workers = ThreadedWorkers::new(|_| Stalled);
        let a = workers.spawn().unwrap();
        workers.grant(a, 1_000).unwrap();

        let started = Instant::now();
        let canceller = token.clone();
        let timer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });
        assert_eq!(workers.await_report(a, &token), Ok(Reply::Cancelled));
        timer.join().unwrap();

        // Teardown gives up on the stalled thread instead of joining it
        workers.terminate_all();
        assert_eq!(workers.live_workers(), 0);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
