//! Bounded logs of entries that left a queue.

use std::collections::VecDeque;

use crate::queue::RemovalRecord;

/// Removed and executed entries, newest last. Each log keeps at most `limit` records.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueHistory {
    limit: usize,
    removed: VecDeque<RemovalRecord>,
    executed: VecDeque<RemovalRecord>,
}

impl QueueHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            removed: VecDeque::new(),
            executed: VecDeque::new(),
        }
    }

    pub fn record(&mut self, record: RemovalRecord) {
        let log = if record.reason.is_execution() {
            &mut self.executed
        } else {
            &mut self.removed
        };
        log.push_back(record);
        while log.len() > self.limit {
            log.pop_front();
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        for log in [&mut self.removed, &mut self.executed] {
            while log.len() > limit {
                log.pop_front();
            }
        }
    }

    pub fn removed(&self) -> impl Iterator<Item = &RemovalRecord> {
        self.removed.iter()
    }

    pub fn executed(&self) -> impl Iterator<Item = &RemovalRecord> {
        self.executed.iter()
    }

    pub fn last_removed(&self) -> Option<&RemovalRecord> {
        self.removed.back()
    }

    pub fn last_executed(&self) -> Option<&RemovalRecord> {
        self.executed.back()
    }
}
