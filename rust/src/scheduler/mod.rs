//! Multi-level feedback queue scheduler.
//!
//! The dispatcher owns a simulated clock, a bounded process table and three
//! priority rings, and drives workers through a one-request-at-a-time
//! handshake.

mod core;
mod queues;
mod state;
mod stats;
mod table;

pub use core::{seeded_rng, Dispatcher, SchedulerError, Step};
pub use queues::{FeedbackQueues, QueueFull, SlotRing};
pub use state::SchedulerState;
pub use stats::RunStats;
pub use table::ProcessTable;
