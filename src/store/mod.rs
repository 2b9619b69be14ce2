//! Durable backing of executor queues.
//!
//! An executor queue with a non-negative store id mirrors every persistent entry
//! into a [`QueueStore`]. The in-memory queue stays authoritative: store failures
//! during mutation are logged by the caller, only a failed id listing aborts a load.

mod memory;

pub use memory::MemoryStore;

use qtty::Seconds;
use thiserror::Error;

use crate::queue::{QueueEntry, Window};
use crate::target::{Target, TargetId};
use crate::Qid;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Stored queue entry {0} not found")]
    NotFound(Qid),

    #[error("Stored queue entry {qid} is malformed: {reason}")]
    Malformed { qid: Qid, reason: String },

    #[error("Queue store unavailable: {0}")]
    Unavailable(String),

    #[error("Queue store backend error: {0}")]
    Backend(String),
}

/// Persisted form of a queue entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoredEntry {
    pub qid: Qid,
    pub target_id: TargetId,
    pub start: Option<Seconds>,
    pub end: Option<Seconds>,
    pub plan_id: Option<i64>,
    pub hard: bool,
    pub repeats: Option<u32>,
    pub repeat_separation: Option<Seconds>,
    /// Position in the queue when last written.
    pub order: usize,
}

impl StoredEntry {
    pub fn from_entry<T: Target>(entry: &QueueEntry<T>) -> Self {
        Self {
            qid: entry.qid(),
            target_id: entry.target_id(),
            start: entry.window().start(),
            end: entry.window().end(),
            plan_id: entry.plan_id(),
            hard: entry.is_hard(),
            repeats: entry.repeats(),
            repeat_separation: entry.repeat_separation(),
            order: entry.queue_order(),
        }
    }

    /// Rebuilds the admission window, rejecting records that break its invariants.
    pub fn window(&self) -> StoreResult<Window> {
        Window::new(self.start, self.end).map_err(|e| StoreError::Malformed {
            qid: self.qid,
            reason: e.to_string(),
        })
    }
}

/// Persistence of queue entries, keyed by store id (one per executor queue).
pub trait QueueStore: Send + Sync {
    /// Ids of the entries stored for a queue, in queue order.
    fn load_entry_ids(&self, store_id: i32) -> StoreResult<Vec<Qid>>;

    fn load_entry(&self, qid: Qid) -> StoreResult<StoredEntry>;

    fn create(&self, store_id: i32, entry: &StoredEntry) -> StoreResult<()>;

    fn update(&self, entry: &StoredEntry) -> StoreResult<()>;

    fn remove(&self, qid: Qid) -> StoreResult<()>;
}
