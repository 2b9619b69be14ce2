//! Read-only view of an executor queue published for monitoring.

use qtty::Seconds;

use crate::queue::{RemovalRecord, TargetQueue};
use crate::target::{Target, TargetId};
use crate::units::known_or_zero;
use crate::Qid;

/// Queue contents in queue order, one element per entry in every array.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueSnapshot {
    pub queue: String,
    pub ids: Vec<TargetId>,
    pub names: Vec<String>,
    pub qids: Vec<Qid>,
    pub starts: Vec<Option<Seconds>>,
    pub ends: Vec<Option<Seconds>>,
    pub plan_ids: Vec<Option<i64>>,
    pub hard: Vec<bool>,
    pub repeats: Vec<Option<u32>>,
    /// Estimated script time of entries west of the meridian.
    pub west_duration: Seconds,
    /// Estimated script time of entries east of the meridian.
    pub east_duration: Seconds,
}

impl QueueSnapshot {
    pub fn empty(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            ids: Vec::new(),
            names: Vec::new(),
            qids: Vec::new(),
            starts: Vec::new(),
            ends: Vec::new(),
            plan_ids: Vec::new(),
            hard: Vec::new(),
            repeats: Vec::new(),
            west_duration: Seconds::new(0.0),
            east_duration: Seconds::new(0.0),
        }
    }

    pub(crate) fn capture<T: Target>(name: &str, queue: &TargetQueue<T>, now: Seconds) -> Self {
        let mut snapshot = Self::empty(name);
        for entry in queue.entries() {
            let target = entry.target();
            snapshot.ids.push(target.id());
            snapshot.names.push(target.name().to_string());
            snapshot.qids.push(entry.qid());
            snapshot.starts.push(entry.window().start());
            snapshot.ends.push(entry.window().end());
            snapshot.plan_ids.push(entry.plan_id());
            snapshot.hard.push(entry.is_hard());
            snapshot.repeats.push(entry.repeats());

            let duration = known_or_zero(queue.entry_duration(entry));
            if target.hour_angle(now, queue.observer()).value() > 0.0 {
                snapshot.west_duration = snapshot.west_duration + duration;
            } else {
                snapshot.east_duration = snapshot.east_duration + duration;
            }
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Receiver of monitoring values. Nothing written here flows back into the queue.
pub trait ValueSink: Send + Sync {
    /// Called after every mutation with the full queue contents.
    fn publish_queue(&self, snapshot: &QueueSnapshot);

    /// Called once per entry leaving the queue.
    fn publish_removal(&self, queue: &str, record: &RemovalRecord);
}
