//! Simulated clock with (seconds, nanoseconds) carry normalization.

use std::fmt;
use std::ops::Add;

/// Nanoseconds per simulated second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point (or span) of simulated time.
///
/// Invariant: `nanoseconds < NANOS_PER_SEC`. Field order makes the derived
/// `Ord` compare seconds first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime {
    pub seconds: u64,
    pub nanoseconds: u32,
}

impl SimTime {
    pub const ZERO: SimTime = SimTime {
        seconds: 0,
        nanoseconds: 0,
    };

    /// Build a normalized time from possibly oversized parts.
    pub fn new(seconds: u64, nanoseconds: u64) -> Self {
        let mut t = SimTime {
            seconds,
            nanoseconds: 0,
        };
        t.add_parts(0, nanoseconds);
        t
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self::new(0, nanos)
    }

    /// Total nanoseconds, saturating at `u64::MAX`.
    pub fn as_nanos(&self) -> u64 {
        self.seconds
            .saturating_mul(NANOS_PER_SEC)
            .saturating_add(self.nanoseconds as u64)
    }

    /// Difference `self - earlier`, or zero if `earlier` is later.
    pub fn saturating_sub(self, earlier: SimTime) -> SimTime {
        if self <= earlier {
            return SimTime::ZERO;
        }
        let (seconds, nanoseconds) = if self.nanoseconds >= earlier.nanoseconds {
            (
                self.seconds - earlier.seconds,
                self.nanoseconds - earlier.nanoseconds,
            )
        } else {
            (
                self.seconds - earlier.seconds - 1,
                self.nanoseconds + NANOS_PER_SEC as u32 - earlier.nanoseconds,
            )
        };
        SimTime {
            seconds,
            nanoseconds,
        }
    }

    fn add_parts(&mut self, add_seconds: u64, add_nanos: u64) {
        let nanos = self.nanoseconds as u64 + add_nanos;
        self.seconds += add_seconds + nanos / NANOS_PER_SEC;
        self.nanoseconds = (nanos % NANOS_PER_SEC) as u32;
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(mut self, rhs: SimTime) -> SimTime {
        self.add_parts(rhs.seconds, rhs.nanoseconds as u64);
        self
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

/// The scheduler's virtual clock. Only ever moves forward.
#[derive(Clone, Debug, Default)]
pub struct SimulatedClock {
    now: SimTime,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Add both fields, carrying nanoseconds into seconds.
    pub fn advance(&mut self, add_seconds: u64, add_nanos: u64) {
        self.now.add_parts(add_seconds, add_nanos);
    }

    /// Jump straight to `target`. Targets in the past are ignored.
    pub fn advance_to(&mut self, target: SimTime) {
        if target > self.now {
            self.now = target;
        }
    }
}
