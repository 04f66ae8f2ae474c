//! Cancellation: an interrupt flag plus an optional wall-clock deadline.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Checked by the dispatcher at the top of every loop iteration.
///
/// Clones share the interrupt flag, so a signal handler can hold one while the
/// dispatcher holds another.
#[derive(Clone, Debug)]
pub struct ShutdownToken {
    interrupted: Arc<AtomicBool>,
    started_at: DateTime<Utc>,
    limit: Option<TimeDelta>,
}

impl ShutdownToken {
    /// Token that only fires on `cancel()`.
    pub fn new() -> Self {
        Self {
            interrupted: Arc::new(AtomicBool::new(false)),
            started_at: Utc::now(),
            limit: None,
        }
    }

    /// Token that also fires once `secs` of wall-clock time have passed.
    /// Zero means no deadline.
    pub fn with_deadline_secs(secs: u64) -> Self {
        let mut token = Self::new();
        if secs > 0 {
            token.limit = TimeDelta::try_seconds(secs.min(i64::MAX as u64) as i64);
        }
        token
    }

    pub fn cancel(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }

    pub fn deadline_passed(&self) -> bool {
        match self.limit {
            Some(limit) => Utc::now() - self.started_at >= limit,
            None => false,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.is_interrupted() || self.deadline_passed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}
