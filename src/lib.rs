//! skyqueue - target execution queues for robotic observatories
//!
//! Holds pending observation requests and decides, under changing sky visibility,
//! which one the telescope should execute next.

pub mod executor;
pub mod queue;
pub mod simulation;
pub mod store;
pub mod target;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;

pub use executor::{ExecutorQueue, Selection};
pub use queue::{QueueConfig, QueueEntry, QueuePolicy, TargetQueue};
pub use simulation::{SimulationOutcome, SimulationQueue};
pub use target::{Observer, Target, TargetFactory, TargetId};

/// Queue entry identifier, unique for the life of the process.
pub type Qid = u64;
