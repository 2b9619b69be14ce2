use qtty::Seconds;
use thiserror::Error;

use crate::store::StoreError;
use crate::Qid;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("Time value cannot be NaN")]
    NaNTime,

    #[error("Window start {} is after its end {}", .start.value(), .end.value())]
    InvalidWindow { start: Seconds, end: Seconds },

    #[error("Queue index {index} out of range for queue of length {len}")]
    IndexOutOfRange { index: isize, len: usize },

    #[error("Queue entry {0} not found")]
    UnknownEntry(Qid),

    #[error("Unknown queue policy: {0}")]
    UnknownPolicy(String),

    #[error("Queue store failure: {0}")]
    Store(#[from] StoreError),
}
