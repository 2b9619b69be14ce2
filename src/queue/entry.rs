//! Queue entries and their admission windows.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use qtty::Seconds;

use super::error::QueueError;
use crate::target::{Target, TargetId};
use crate::Qid;

/// Admissible time interval `[start, end)` of a queue entry.
///
/// A missing bound is unbounded.
///
/// # Invariants
///
/// - if both bounds are present, `start <= end`
/// - neither bound is `NaN`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Window {
    start: Option<Seconds>,
    end: Option<Seconds>,
}

impl Window {
    /// Creates a window, rejecting `NaN` bounds and `start > end`.
    pub fn new(start: Option<Seconds>, end: Option<Seconds>) -> Result<Self, QueueError> {
        if start.is_some_and(|s| s.value().is_nan()) || end.is_some_and(|e| e.value().is_nan())
        {
            return Err(QueueError::NaNTime);
        }
        if let (Some(s), Some(e)) = (start, end) {
            if s.value() > e.value() {
                return Err(QueueError::InvalidWindow { start: s, end: e });
            }
        }
        Ok(Self { start, end })
    }

    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Window that opens at `start` and never closes.
    pub const fn starting_at(start: Seconds) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub const fn start(&self) -> Option<Seconds> {
        self.start
    }

    pub const fn end(&self) -> Option<Seconds> {
        self.end
    }

    /// True if either bound is set.
    pub const fn is_committed(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    /// Returns true iff `start <= now` (or unbounded) and `now < end` (or unbounded).
    pub fn not_expired(&self, now: Seconds) -> bool {
        self.start.map_or(true, |s| s.value() <= now.value())
            && self.end.map_or(true, |e| e.value() > now.value())
    }

    /// Returns true if the window has closed at `now`.
    pub fn has_ended(&self, now: Seconds) -> bool {
        self.end.is_some_and(|e| e.value() <= now.value())
    }

    /// Returns true if the window opens after `now`.
    pub fn starts_after(&self, now: Seconds) -> bool {
        self.start.is_some_and(|s| s.value() > now.value())
    }

    /// Moves the start to `start`, shifting a bounded end by the same amount so the
    /// window keeps its length and its ordering invariant.
    pub(crate) fn reschedule(&mut self, start: Seconds) {
        if let (Some(old_start), Some(end)) = (self.start, self.end) {
            self.end = Some(end + (start - old_start));
        }
        if let Some(end) = self.end {
            if end.value() < start.value() {
                self.end = Some(start);
            }
        }
        self.start = Some(start);
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_bound = |b: Option<Seconds>| match b {
            Some(v) => format!("{:.3}", v.value()),
            None => "-".to_string(),
        };
        write!(f, "[{}, {})", fmt_bound(self.start), fmt_bound(self.end))
    }
}

/// Monotonically increasing source of queue entry ids.
///
/// One sequence is shared by every queue of a process so that ids stay unique
/// across queues; tests inject a private one for deterministic ids.
#[derive(Debug, Default)]
pub struct QidSequence {
    last: AtomicU64,
}

static PROCESS_QIDS: Lazy<Arc<QidSequence>> = Lazy::new(|| Arc::new(QidSequence::new()));

impl QidSequence {
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// The process-wide sequence.
    pub fn process() -> Arc<QidSequence> {
        Arc::clone(&PROCESS_QIDS)
    }

    /// Allocates the next id. Ids start at 1 and are never reused.
    pub fn next_qid(&self) -> Qid {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Records an id allocated elsewhere (e.g. loaded from a store) so that
    /// later allocations stay above it.
    pub fn observe(&self, qid: Qid) {
        self.last.fetch_max(qid, Ordering::SeqCst);
    }

    /// Last id handed out or observed.
    pub fn last(&self) -> Qid {
        self.last.load(Ordering::SeqCst)
    }
}

/// One admitted observation request.
#[derive(Debug, Clone)]
pub struct QueueEntry<T: Target> {
    pub(crate) qid: Qid,
    pub(crate) target: T,
    pub(crate) window: Window,
    pub(crate) plan_id: Option<i64>,
    pub(crate) hard: bool,
    pub(crate) repeats: Option<u32>,
    pub(crate) repeat_separation: Option<Seconds>,
    pub(crate) persistent: bool,
    pub(crate) unobservable_reported: bool,
    pub(crate) queue_order: usize,
    /// Completed requeue cycles, passed to the script estimator as repeat index.
    pub(crate) cycles: u32,
}

impl<T: Target> QueueEntry<T> {
    pub fn new(qid: Qid, target: T, window: Window) -> Self {
        Self {
            qid,
            target,
            window,
            plan_id: None,
            hard: false,
            repeats: None,
            repeat_separation: None,
            persistent: false,
            unobservable_reported: false,
            queue_order: 0,
            cycles: 0,
        }
    }

    pub fn with_plan(mut self, plan_id: Option<i64>) -> Self {
        self.plan_id = plan_id;
        self
    }

    pub fn with_hard(mut self, hard: bool) -> Self {
        self.hard = hard;
        self
    }

    pub fn with_repeats(mut self, repeats: Option<u32>, separation: Option<Seconds>) -> Self {
        self.repeats = repeats;
        self.repeat_separation = separation;
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Same scheduling metadata bound to a freshly created target.
    pub(crate) fn rebind(mut self, target: T) -> (Self, T) {
        let old = std::mem::replace(&mut self.target, target);
        self.unobservable_reported = false;
        (self, old)
    }

    pub fn qid(&self) -> Qid {
        self.qid
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_id(&self) -> TargetId {
        self.target.id()
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn plan_id(&self) -> Option<i64> {
        self.plan_id
    }

    pub fn is_hard(&self) -> bool {
        self.hard
    }

    pub fn repeats(&self) -> Option<u32> {
        self.repeats
    }

    pub fn repeat_separation(&self) -> Option<Seconds> {
        self.repeat_separation
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Last computed position in the queue. Exported for monitoring only.
    pub fn queue_order(&self) -> usize {
        self.queue_order
    }

    pub fn not_expired(&self, now: Seconds) -> bool {
        self.window.not_expired(now)
    }

    /// Time-committed entry whose observation has already started.
    pub(crate) fn started_committed(&self) -> bool {
        self.window.start().is_some() && self.target.observation_started()
    }

    /// Consumes one repeat. Pushes the window start to `now + separation` when a
    /// separation is set.
    pub(crate) fn consume_repeat(&mut self, now: Seconds) {
        if let Some(n) = self.repeats.as_mut() {
            *n = n.saturating_sub(1);
        }
        if let Some(sep) = self.repeat_separation {
            self.window.reschedule(now + sep);
        }
        self.cycles += 1;
    }
}
