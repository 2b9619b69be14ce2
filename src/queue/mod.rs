//! Ordered queue of observation requests and its ordering/filtering engine.
//!
//! A [`TargetQueue`] is pure decision logic: given "now" it sorts its entries,
//! requeues repeating ones and drops or defers what cannot be observed, leaving a
//! validated candidate at the front. Side effects the owner has to act on
//! (history, persistence) are journaled as [`QueueChange`]s and drained with
//! [`TargetQueue::drain_changes`].

mod config;
mod entry;
mod error;
pub mod ordering;
mod policy;
mod removal;


pub use config::QueueConfig;
pub use entry::{QidSequence, QueueEntry, Window};
pub use error::QueueError;
pub use policy::QueuePolicy;
pub use removal::{QueueChange, RemovalReason, RemovalRecord};

use std::collections::VecDeque;
use std::sync::Arc;

use qtty::Seconds;

use crate::target::{EquPosition, Observer, ScriptEstimator, Target, TargetFactory, TargetId};
use crate::Qid;

/// Ordered queue of observation requests for one execution slot.
///
/// The queue owns its entries and their targets. Position 0 is the candidate
/// offered to the telescope; [`before_change`](Self::before_change) and
/// [`filter`](Self::filter) keep a validated entry there.
///
/// # Internal Structure
/// - `entries`: `Vec` of [`QueueEntry`] in queue order; `queue_order` mirrors the index
/// - `qids`: shared [`QidSequence`] the entry ids are drawn from
/// - `current`: qid of the entry whose target is executing; its target is
///   moved to `detached` instead of being dropped
/// - `changes`: journal of removals and metadata updates, drained by the owner
///
/// # Complexity
/// - `insert` / `remove_index`: O(n)
/// - `sort_queue`: O(n log n) for key sorts, O(n² log n) for the greedy walks
/// - `filter`: O(n) oracle calls
///
/// # Examples
///
/// ```ignore
/// use skyqueue::queue::{QueueConfig, QueuePolicy, TargetQueue, Window};
///
/// let mut queue = TargetQueue::new(
///     QueueConfig::with_policy(QueuePolicy::Altitude),
///     observer,
///     factory,
///     estimator,
/// );
/// let entry = queue.new_entry(catalogue_target(1001), Window::unbounded());
/// queue.push_back(entry);
///
/// queue.before_change(now);
/// if queue.filter(now, None, true) {
///     let next = queue.front().map(|e| e.target_id());
/// }
/// ```
pub struct TargetQueue<T: Target> {
    entries: Vec<QueueEntry<T>>,
    config: QueueConfig,
    observer: Arc<Observer>,
    factory: Arc<dyn TargetFactory<T>>,
    estimator: Arc<dyn ScriptEstimator<T>>,
    qids: Arc<QidSequence>,
    /// Entry whose target is executing; its target is never dropped by the queue.
    current: Option<Qid>,
    detached: Vec<T>,
    changes: Vec<QueueChange>,
}

impl<T: Target> TargetQueue<T> {
    /// Creates an empty queue drawing ids from the process-wide sequence.
    pub fn new(
        config: QueueConfig,
        observer: Arc<Observer>,
        factory: Arc<dyn TargetFactory<T>>,
        estimator: Arc<dyn ScriptEstimator<T>>,
    ) -> Self {
        Self {
            entries: Vec::new(),
            config,
            observer,
            factory,
            estimator,
            qids: QidSequence::process(),
            current: None,
            detached: Vec::new(),
            changes: Vec::new(),
        }
    }

    /// Replaces the id sequence, e.g. with a private one for deterministic ids.
    pub fn with_qids(mut self, qids: Arc<QidSequence>) -> Self {
        self.qids = qids;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[QueueEntry<T>] {
        &self.entries
    }

    pub fn front(&self) -> Option<&QueueEntry<T>> {
        self.entries.first()
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry<T>> {
        self.entries.get(index)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut QueueConfig {
        &mut self.config
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn qids(&self) -> &Arc<QidSequence> {
        &self.qids
    }

    pub(crate) fn factory(&self) -> &dyn TargetFactory<T> {
        self.factory.as_ref()
    }

    pub(crate) fn front_mut(&mut self) -> Option<&mut QueueEntry<T>> {
        self.entries.first_mut()
    }

    pub(crate) fn entry_mut(&mut self, qid: Qid) -> Option<&mut QueueEntry<T>> {
        self.entries.iter_mut().find(|e| e.qid == qid)
    }

    /// Takes every entry out, leaving the queue empty. Nothing is retired.
    pub(crate) fn take_entries(&mut self) -> Vec<QueueEntry<T>> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn replace_entries(&mut self, entries: Vec<QueueEntry<T>>) {
        self.entries = entries;
        self.renumber();
    }

    /// Wraps a target in a new entry with a freshly allocated qid.
    pub fn new_entry(&self, target: T, window: Window) -> QueueEntry<T> {
        QueueEntry::new(self.qids.next_qid(), target, window)
    }

    // =========================================================================
    // Insertion and lookup
    // =========================================================================

    /// Inserts at a logical index. Negative indices count from the back, `-1`
    /// being the end of the queue; out-of-range indices are clamped.
    /// Returns the position the entry landed at.
    pub fn insert(&mut self, index: isize, entry: QueueEntry<T>) -> usize {
        let len = self.entries.len() as isize;
        let pos = if index < 0 { len + 1 + index } else { index };
        let pos = pos.clamp(0, len) as usize;
        self.entries.insert(pos, entry);
        self.renumber();
        pos
    }

    pub fn push_front(&mut self, entry: QueueEntry<T>) {
        self.insert(0, entry);
    }

    pub fn push_back(&mut self, entry: QueueEntry<T>) {
        self.insert(-1, entry);
    }

    /// Position of the first entry holding the given target.
    pub fn find_target(&self, target_id: TargetId) -> Option<usize> {
        self.entries.iter().position(|e| e.target.id() == target_id)
    }

    pub fn position_of(&self, qid: Qid) -> Option<usize> {
        self.entries.iter().position(|e| e.qid == qid)
    }

    /// Moves the entries of the listed targets to the front, in list order.
    /// Each id claims the first entry not yet claimed; everything else keeps its
    /// relative order behind them.
    pub fn order_by_target_list(&mut self, target_ids: &[TargetId]) {
        let mut rest: Vec<Option<QueueEntry<T>>> =
            std::mem::take(&mut self.entries).into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(rest.len());
        for id in target_ids {
            let claimed = rest
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|e| e.target.id() == *id))
                .and_then(Option::take);
            if let Some(entry) = claimed {
                ordered.push(entry);
            }
        }
        ordered.extend(rest.into_iter().flatten());
        self.entries = ordered;
        self.renumber();
    }

    // =========================================================================
    // Removal and target ownership
    // =========================================================================

    /// Removes the entry at a logical index (`-1` is the last entry).
    pub fn remove_index(&mut self, index: isize, at: Seconds) -> Result<RemovalRecord, QueueError> {
        let len = self.entries.len();
        let pos = if index < 0 { len as isize + index } else { index };
        if pos < 0 || pos as usize >= len {
            return Err(QueueError::IndexOutOfRange { index, len });
        }
        let entry = self.entries.remove(pos as usize);
        let record = self.retire(entry, RemovalReason::Deleted, at);
        self.renumber();
        Ok(record)
    }

    /// Removes every entry. The current target, if queued, is detached.
    pub fn clear(&mut self, at: Seconds) {
        for entry in std::mem::take(&mut self.entries) {
            self.retire(entry, RemovalReason::Deleted, at);
        }
    }

    /// Marks the entry whose target the execution subsystem now runs.
    pub fn set_current(&mut self, qid: Option<Qid>) {
        self.current = qid;
    }

    pub fn current(&self) -> Option<Qid> {
        self.current
    }

    /// Targets the queue let go of while they were current. The caller owns them.
    pub fn take_detached(&mut self) -> Vec<T> {
        std::mem::take(&mut self.detached)
    }

    pub fn drain_changes(&mut self) -> Vec<QueueChange> {
        std::mem::take(&mut self.changes)
    }

    pub(crate) fn note_update(&mut self, qid: Qid) {
        self.changes.push(QueueChange::Updated(qid));
    }

    pub(crate) fn retire(
        &mut self,
        entry: QueueEntry<T>,
        reason: RemovalReason,
        at: Seconds,
    ) -> RemovalRecord {
        log::warn!(
            "removing target {} ({}) qid {} from queue: {}",
            entry.target.name(),
            entry.target.id(),
            entry.qid,
            reason
        );
        let record = RemovalRecord {
            qid: entry.qid,
            target_id: entry.target.id(),
            target_name: entry.target.name().to_string(),
            at,
            reason,
            persistent: entry.persistent,
        };
        self.dispose(entry.qid, entry.target);
        self.changes.push(QueueChange::Removed(record.clone()));
        record
    }

    /// Drops a target the queue owned, or hands it off if it is the current one.
    pub(crate) fn dispose(&mut self, qid: Qid, target: T) {
        if self.current == Some(qid) {
            self.current = None;
            self.detached.push(target);
        }
    }

    // =========================================================================
    // Oracle helpers
    // =========================================================================

    /// Estimated script duration, `NaN` when the estimator fails.
    pub fn maximal_duration(
        &self,
        target: &T,
        current: Option<&EquPosition>,
        repeat_index: u32,
    ) -> Seconds {
        match self
            .estimator
            .maximal_script_duration(target, current, repeat_index)
        {
            Ok(duration) => duration,
            Err(err) => {
                log::error!("{}", err);
                Seconds::new(f64::NAN)
            }
        }
    }

    pub(crate) fn entry_duration(&self, entry: &QueueEntry<T>) -> Seconds {
        self.maximal_duration(&entry.target, None, entry.cycles)
    }

    /// Script length used for slot simulation: unknown or non-positive estimates
    /// fall back to the configured default.
    pub(crate) fn script_length(&self, target: &T) -> Seconds {
        let duration = self.maximal_duration(target, None, 0);
        if duration.value() > 0.0 {
            duration
        } else {
            self.config.default_script_length
        }
    }

    /// Visibility of an entry. A future window start moves `at` forward to it.
    pub fn is_above_horizon(&self, entry: &QueueEntry<T>, at: &mut Seconds) -> bool {
        if let Some(start) = entry.window.start() {
            if start.value() > at.value() {
                *at = start;
            }
        }
        let position = entry.target.alt_az(*at, &self.observer);
        if !position.is_defined() {
            return false;
        }
        entry.target.is_above_horizon(&position)
            && (!self.config.test_constraints || entry.target.violated_constraints(*at).is_empty())
    }

    /// True when the entry behind the front is outside its window.
    pub fn front_time_expires(&self, now: Seconds) -> bool {
        self.entries.get(1).is_some_and(|e| !e.not_expired(now))
    }

    pub fn revalidate_constraints(&mut self, watch_id: i32) {
        for entry in &mut self.entries {
            entry.target.revalidate_constraints(watch_id);
        }
    }

    // =========================================================================
    // Selection cycle
    // =========================================================================

    /// Sort, requeue the front if it repeats, then filter.
    pub fn before_change(&mut self, now: Seconds) {
        self.sort_queue(now);
        self.rotate(now);
        self.filter(now, None, true);
    }

    pub fn sort_queue(&mut self, now: Seconds) {
        if !self.config.policy.sorts() || self.entries.len() < 2 {
            return;
        }
        if self.config.block_until_visible && !self.front_visible(now) {
            return;
        }
        let order = match self.config.policy {
            QueuePolicy::Fifo | QueuePolicy::Circular => return,
            QueuePolicy::Altitude => ordering::by_altitude(self, now),
            QueuePolicy::WestEast => ordering::by_west_east(self, now),
            QueuePolicy::WestEastMeridian => ordering::meridian_walk(self, now),
            QueuePolicy::SoonestOutOfLimits => ordering::out_of_limits_walk(self, now),
        };
        self.apply_order(&order);
    }

    fn front_visible(&self, now: Seconds) -> bool {
        let mut at = now;
        self.entries
            .first()
            .map_or(true, |e| self.is_above_horizon(e, &mut at))
    }

    fn apply_order(&mut self, order: &[usize]) {
        let mut slots: Vec<Option<QueueEntry<T>>> =
            std::mem::take(&mut self.entries).into_iter().map(Some).collect();
        let mut sorted: Vec<QueueEntry<T>> = order
            .iter()
            .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
            .collect();
        sorted.extend(slots.into_iter().flatten());
        self.entries = sorted;
        self.renumber();
    }

    /// Moves a repeating front entry to the back with a freshly created target.
    fn rotate(&mut self, now: Seconds) {
        let requeue = match self.entries.first() {
            Some(front) => self.config.policy.requeues_front(front.repeats),
            None => false,
        };
        if !requeue {
            return;
        }
        let mut entry = self.entries.remove(0);
        if entry.repeats.is_some_and(|n| n > 0) {
            entry.consume_repeat(now);
        }
        match self.factory.create_target(entry.target.id(), &self.observer) {
            Some(target) => {
                let (entry, old) = entry.rebind(target);
                self.dispose(entry.qid, old);
                if entry.persistent {
                    self.note_update(entry.qid);
                }
                self.entries.push(entry);
            }
            None => {
                log::warn!(
                    "cannot recreate target {} for requeue, dropping qid {}",
                    entry.target.id(),
                    entry.qid
                );
                self.retire(entry, RemovalReason::Deleted, now);
            }
        }
        self.renumber();
    }

    /// Drops expired and unobservable entries. Returns true when the front entry
    /// is ready to be observed.
    pub fn filter(&mut self, now: Seconds, max_length: Option<Seconds>, remove_observed: bool) -> bool {
        self.filter_expired(now);
        let (ready, skipped) = self.filter_unobservable(now, max_length, remove_observed);
        let at = usize::from(!self.entries.is_empty());
        self.entries.splice(at..at, skipped);
        self.renumber();
        ready
    }

    pub fn filter_expired(&mut self, now: Seconds) {
        if self.config.policy == QueuePolicy::Fifo {
            let due = self.entries.iter().position(|e| {
                e.window.start().is_some_and(|s| s.value() <= now.value()) || e.window.has_ended(now)
            });
            if let Some(pos) = due {
                let superseded: Vec<_> = self.entries.drain(..pos).collect();
                for entry in superseded {
                    self.retire(entry, RemovalReason::Superseded, now);
                }
            }
        }

        for entry in std::mem::take(&mut self.entries) {
            if entry.window.has_ended(now) {
                self.retire(entry, RemovalReason::WindowExpired, now);
            } else if self.config.remove_after_execution && entry.target.observation_started() {
                self.retire(entry, RemovalReason::Executed, now);
            } else {
                self.entries.push(entry);
            }
        }
        self.renumber();
    }

    /// Walks from the front until an observable entry is found. Returns whether
    /// one was found and the entries set aside on the way.
    fn filter_unobservable(
        &mut self,
        now: Seconds,
        max_length: Option<Seconds>,
        remove_observed: bool,
    ) -> (bool, Vec<QueueEntry<T>>) {
        let mut pending: VecDeque<QueueEntry<T>> = std::mem::take(&mut self.entries).into();
        let mut skipped = Vec::new();
        let mut ready = false;

        while let Some(mut entry) = pending.pop_front() {
            let mut at = now;
            let deferred =
                self.config.policy == QueuePolicy::Circular && entry.window.starts_after(now);
            if !deferred
                && self.is_above_horizon(&entry, &mut at)
                && self.fits(&entry, max_length, remove_observed)
            {
                entry.unobservable_reported = false;
                pending.push_front(entry);
                ready = true;
                break;
            }
            if self.config.block_until_visible {
                pending.push_front(entry);
                break;
            }
            if entry.started_committed() {
                log::warn!(
                    "target {} ({}) qid {} has a committed window and already started",
                    entry.target.name(),
                    entry.target.id(),
                    entry.qid
                );
                self.retire(entry, RemovalReason::Executed, now);
            } else if self.config.skip_below_horizon || deferred {
                if !entry.unobservable_reported {
                    log::warn!(
                        "target {} ({}) qid {} is not observable at {:.0}",
                        entry.target.name(),
                        entry.target.id(),
                        entry.qid,
                        at.value()
                    );
                    entry.unobservable_reported = true;
                }
                skipped.push(entry);
            } else {
                self.retire(entry, RemovalReason::BelowHorizon, now);
            }
        }

        self.entries = pending.into();
        (ready, skipped)
    }

    /// Script length test. Unknown durations pass.
    fn fits(&self, entry: &QueueEntry<T>, max_length: Option<Seconds>, remove_observed: bool) -> bool {
        let Some(max) = max_length else {
            return true;
        };
        if !remove_observed || !self.config.check_target_length {
            return true;
        }
        let duration = self.entry_duration(entry);
        duration.value().is_nan() || duration.value() < max.value()
    }

    /// Refreshes positions. Persistent entries that moved are journaled so the
    /// stored order follows the live one.
    fn renumber(&mut self) {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if entry.queue_order != i {
                entry.queue_order = i;
                if entry.persistent {
                    self.changes.push(QueueChange::Updated(entry.qid));
                }
            }
        }
    }
}

impl<T: Target> std::fmt::Debug for TargetQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetQueue")
            .field("policy", &self.config.policy)
            .field("entries", &self.entries.len())
            .field("current", &self.current)
            .finish()
    }
}
