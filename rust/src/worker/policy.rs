//! Worker decision policies.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::WorkerPolicy;

/// Percent chance per grant that a random worker terminates.
const TERMINATION_PERCENT: u32 = 5;

/// Reference worker behaviour.
///
/// Per grant: 5% chance to terminate after using 1-99% of the quantum;
/// otherwise a coin flip between the full quantum and 1-99% followed by a block.
pub struct RandomPolicy<R: Rng = StdRng> {
    rng: R,
}

impl RandomPolicy<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

/// Payload reporting termination after `consumed` ns.
///
/// A zero payload reads as a yield, so termination always reports at least 1 ns.
fn terminate_after(consumed: i64) -> i64 {
    -consumed.max(1)
}

impl<R: Rng> RandomPolicy<R> {
    fn partial(&mut self, quantum: i64) -> i64 {
        let percent: i64 = self.rng.gen_range(1..=99);
        quantum * percent / 100
    }
}

impl<R: Rng> WorkerPolicy for RandomPolicy<R> {
    fn respond(&mut self, quantum: i64) -> i64 {
        if self.rng.gen_range(0..100) < TERMINATION_PERCENT {
            return terminate_after(self.partial(quantum));
        }
        if self.rng.gen_bool(0.5) {
            quantum
        } else {
            self.partial(quantum)
        }
    }
}

/// One scripted reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptStep {
    /// Use the whole quantum
    Full,
    /// Use this percent of the quantum, then block
    Partial(u8),
    /// Use this percent of the quantum, then terminate
    Terminate(u8),
}

/// Replays a fixed script. Terminates with the full quantum once exhausted.
#[derive(Clone, Debug)]
pub struct ScriptedPolicy {
    steps: Vec<ScriptStep>,
    next: usize,
}

impl ScriptedPolicy {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps, next: 0 }
    }
}

impl WorkerPolicy for ScriptedPolicy {
    fn respond(&mut self, quantum: i64) -> i64 {
        let step = self
            .steps
            .get(self.next)
            .copied()
            .unwrap_or(ScriptStep::Terminate(100));
        self.next += 1;
        match step {
            ScriptStep::Full => quantum,
            ScriptStep::Partial(percent) => quantum * percent.min(99) as i64 / 100,
            ScriptStep::Terminate(percent) => {
                terminate_after(quantum * percent.min(100) as i64 / 100)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::Report;

    #[test]
    fn test_random_policy_stays_within_quantum() {
        let mut policy = RandomPolicy::seeded(42);
        let quantum = 10_000_000;
        let mut seen_exhausted = false;
        let mut seen_yield = false;
        for _ in 0..2_000 {
            let payload = policy.respond(quantum);
            match Report::decode(payload, quantum).unwrap() {
                Report::Exhausted { .. } => seen_exhausted = true,
                Report::Yielded { consumed } => {
                    assert!(consumed >= (quantum / 100) as u64);
                    seen_yield = true;
                }
                Report::Terminated { consumed } => assert!(consumed > 0),
            }
        }
        assert!(seen_exhausted && seen_yield);
    }

    #[test]
    fn test_scripted_policy_replays_then_terminates() {
        let mut policy = ScriptedPolicy::new(vec![ScriptStep::Full, ScriptStep::Partial(40)]);
        assert_eq!(policy.respond(100), 100);
        assert_eq!(policy.respond(100), 40);
        assert_eq!(policy.respond(100), -100);
    }

    #[test]
    fn test_tiny_quantum_still_terminates() {
        let mut scripted = ScriptedPolicy::new(vec![ScriptStep::Terminate(0)]);
        let payload = scripted.respond(10);
        assert_eq!(payload, -1);
        assert_eq!(
            Report::decode(payload, 10),
            Ok(Report::Terminated { consumed: 1 })
        );

        // Every partial of a 1 ns quantum rounds down to zero
        let mut random = RandomPolicy::seeded(9);
        let mut terminations = 0;
        for _ in 0..2_000 {
            if let Report::Terminated { consumed } = Report::decode(random.respond(1), 1).unwrap() {
                assert_eq!(consumed, 1);
                terminations += 1;
            }
        }
        assert!(terminations > 0);
    }
}
