//! Why and when entries leave a queue.

use std::fmt::Display;

use qtty::Seconds;

use crate::target::TargetId;
use crate::Qid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RemovalReason {
    /// The entry's window end passed.
    WindowExpired,
    /// A time-committed entry further back became due (FIFO only).
    Superseded,
    /// The observation started and the queue runs every script once.
    Executed,
    /// The entry was unobservable and skipping is disabled.
    BelowHorizon,
    /// Removed on request.
    Deleted,
}

impl RemovalReason {
    /// Stable numeric code as published with removal records. Entries that left
    /// because they were run or overtaken (`Executed`, `Superseded`) have
    /// positive codes, the others negative ones. Only `Executed` records go to
    /// the executed log, see [`is_execution`](Self::is_execution).
    pub const fn code(&self) -> i32 {
        match self {
            RemovalReason::WindowExpired => -1,
            RemovalReason::BelowHorizon => -2,
            RemovalReason::Deleted => -3,
            RemovalReason::Executed => 1,
            RemovalReason::Superseded => 2,
        }
    }

    /// Records for this reason belong to the executed log.
    pub const fn is_execution(&self) -> bool {
        matches!(self, RemovalReason::Executed)
    }
}

impl Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RemovalReason::WindowExpired => "window expired",
            RemovalReason::Superseded => "superseded by a time-committed entry",
            RemovalReason::Executed => "already executed",
            RemovalReason::BelowHorizon => "below horizon",
            RemovalReason::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// One entry leaving the queue.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RemovalRecord {
    pub qid: Qid,
    pub target_id: TargetId,
    pub target_name: String,
    pub at: Seconds,
    pub reason: RemovalReason,
    pub persistent: bool,
}

/// Side effects produced by queue logic, drained by the owning executor.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueChange {
    /// Scheduling metadata of an entry changed (repeats, window, hard flag).
    Updated(Qid),
    /// An entry left the queue.
    Removed(RemovalRecord),
}
