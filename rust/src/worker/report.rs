//! Decoding of worker report payloads.

use thiserror::Error;

/// A worker reply that contradicts the quantum it was granted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("worker reported {payload} ns against a quantum of {quantum} ns")]
    Overrun { quantum: i64, payload: i64 },
}

/// Outcome of one handshake, decoded by sign and magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Report {
    /// Consumed exactly the quantum; demote one level
    Exhausted { consumed: u64 },
    /// Consumed part of the quantum, then blocked on I/O
    Yielded { consumed: u64 },
    /// Elected to terminate after consuming this much
    Terminated { consumed: u64 },
}

impl Report {
    /// Interpret `payload` against the granted `quantum`.
    ///
    /// Exhaustion is exact equality; a payload of 0 is a zero-length yield.
    pub fn decode(payload: i64, quantum: i64) -> Result<Report, ProtocolError> {
        let overrun = ProtocolError::Overrun { quantum, payload };
        if payload < 0 {
            let consumed = payload.unsigned_abs();
            if consumed > quantum.unsigned_abs() {
                return Err(overrun);
            }
            return Ok(Report::Terminated { consumed });
        }
        let consumed = payload as u64;
        if payload == quantum {
            Ok(Report::Exhausted { consumed })
        } else if payload < quantum {
            Ok(Report::Yielded { consumed })
        } else {
            Err(overrun)
        }
    }

    pub fn consumed(&self) -> u64 {
        match *self {
            Report::Exhausted { consumed }
            | Report::Yielded { consumed }
            | Report::Terminated { consumed } => consumed,
        }
    }
}
