//! Look-ahead selection for planning simulators.
//!
//! A [`SimulationQueue`] borrows a live [`TargetQueue`] and walks its entries in
//! queue order. It keeps its own list of pending entries and filters that list
//! with the live rules, so the live queue is never mutated.

use std::collections::VecDeque;

use qtty::Seconds;

use crate::queue::{QueueEntry, QueuePolicy, TargetQueue};
use crate::target::{EquPosition, Target, TargetId};
use crate::units::{is_finite, known_or_zero};
use crate::Qid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationOutcome {
    Selected {
        target_id: TargetId,
        qid: Qid,
        /// Upper bound for the caller's simulated clock.
        expires_at: Seconds,
        /// Position of the target at the simulated start.
        position: EquPosition,
    },
    /// Nothing to run. `until` is the window start of the pending front entry,
    /// if it has one.
    Idle { until: Option<Seconds> },
}

impl SimulationOutcome {
    pub fn target_id(&self) -> Option<TargetId> {
        match self {
            SimulationOutcome::Selected { target_id, .. } => Some(*target_id),
            SimulationOutcome::Idle { .. } => None,
        }
    }
}

pub struct SimulationQueue<'q, T: Target> {
    queue: &'q TargetQueue<T>,
    enabled: bool,
    pending: VecDeque<usize>,
}

impl<'q, T: Target> SimulationQueue<'q, T> {
    pub fn new(queue: &'q TargetQueue<T>) -> Self {
        Self {
            queue,
            enabled: queue.config().enabled,
            pending: (0..queue.len()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn front(&self) -> Option<&'q QueueEntry<T>> {
        let queue = self.queue;
        self.pending.front().and_then(|&i| queue.get(i))
    }

    /// Predicts the selection at `from` for a night ending at `to`.
    ///
    /// Pending entries are filtered the way the live queue filters its own:
    /// ended windows and superseded entries are dropped, unobservable ones are
    /// skipped or dropped. With "remove after execution" the selected entry is
    /// consumed from the simulation; otherwise it stays at the front until it
    /// expires.
    pub fn select_next(
        &mut self,
        from: Seconds,
        to: Seconds,
        current: Option<&EquPosition>,
    ) -> SimulationOutcome {
        if !self.enabled {
            return SimulationOutcome::Idle { until: None };
        }
        self.filter_expired(from);
        let ready = self.filter_unobservable(from, to, current);
        let Some(entry) = self.front() else {
            return SimulationOutcome::Idle { until: None };
        };
        if !(ready && entry.not_expired(from)) {
            return SimulationOutcome::Idle {
                until: entry.window().start(),
            };
        }

        let queue = self.queue;
        let config = queue.config();
        let target = entry.target();
        let position = target.position(from);
        let duration = known_or_zero(queue.maximal_duration(target, current, entry.cycles));

        let expires_at = if config.remove_after_execution {
            self.pending.pop_front();
            from + duration
        } else if let Some(end) = entry.window().end() {
            end
        } else {
            let satisfied = target.satisfied_duration(from, to, duration, config.visibility_step);
            if is_finite(satisfied) {
                from + satisfied
            } else {
                to
            }
        };

        SimulationOutcome::Selected {
            target_id: target.id(),
            qid: entry.qid(),
            expires_at,
            position,
        }
    }

    fn filter_expired(&mut self, from: Seconds) {
        let queue = self.queue;
        let config = queue.config();
        if config.policy == QueuePolicy::Fifo {
            let due = self.pending.iter().position(|&i| {
                queue.get(i).is_some_and(|e| {
                    e.window().start().is_some_and(|s| s.value() <= from.value())
                        || e.window().has_ended(from)
                })
            });
            if let Some(pos) = due {
                self.pending.drain(..pos);
            }
        }
        self.pending.retain(|&i| {
            queue.get(i).is_some_and(|e| {
                !e.window().has_ended(from)
                    && !(config.remove_after_execution && e.target().observation_started())
            })
        });
    }

    /// Moves the first selectable entry to the front, skipped entries right
    /// behind it. Returns whether one was found.
    fn filter_unobservable(
        &mut self,
        from: Seconds,
        to: Seconds,
        current: Option<&EquPosition>,
    ) -> bool {
        let queue = self.queue;
        let config = queue.config();
        let mut skipped = Vec::new();
        let mut ready = false;

        while let Some(i) = self.pending.pop_front() {
            let Some(entry) = queue.get(i) else {
                continue;
            };
            let deferred = config.policy == QueuePolicy::Circular && entry.window().starts_after(from);
            let mut at = from;
            let fits = || {
                let duration = queue.maximal_duration(entry.target(), current, entry.cycles);
                (from + known_or_zero(duration)).value() < to.value()
            };
            if !deferred && queue.is_above_horizon(entry, &mut at) && fits() {
                self.pending.push_front(i);
                ready = true;
                break;
            }
            if config.block_until_visible {
                self.pending.push_front(i);
                break;
            }
            if !entry.started_committed() && (config.skip_below_horizon || deferred) {
                skipped.push(i);
            }
        }

        let at = usize::from(!self.pending.is_empty());
        for (offset, i) in skipped.into_iter().enumerate() {
            self.pending.insert(at + offset, i);
        }
        ready
    }
}
