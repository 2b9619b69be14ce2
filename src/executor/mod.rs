//! Executor queues: a [`TargetQueue`] bound to one telescope execution slot.
//!
//! The executor queue adds administrative operations (add, remove, bulk
//! reconcile, patch), persistence round-trips, admission timers and published
//! monitoring values on top of the pure ordering/filtering engine.
//!
//! All mutation happens synchronously on the caller's thread. After every
//! mutation the queue journal is drained into the history, the store and the
//! value sink, in that order.

mod history;
mod request;
mod snapshot;
mod timer;


pub use history::QueueHistory;
pub use request::{
    parse_entry_requests, parse_target_requests, BulkOptions, EntryRequest, FirstOrdering,
    RequestError, TargetRequest,
};
pub use snapshot::{QueueSnapshot, ValueSink};
pub use timer::{Clock, QueueEvent, SystemClock, TimerService};

use std::fmt::Display;
use std::sync::Arc;

use qtty::Seconds;

use crate::queue::{
    QueueChange, QueueEntry, QueueError, QueuePolicy, RemovalReason, RemovalRecord, TargetQueue,
    Window,
};
use crate::simulation::{SimulationOutcome, SimulationQueue};
use crate::store::{QueueStore, StoredEntry};
use crate::target::{EquPosition, SatisfiedSpan, Target, TargetId};
use crate::Qid;

/// Candidate returned by [`ExecutorQueue::select_next_observation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub target_id: TargetId,
    pub plan_id: Option<i64>,
    pub qid: Qid,
    /// The selection may interrupt a running observation.
    pub hard: bool,
}

/// Scheduling metadata of a new entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryOptions {
    /// Logical insertion index; negative counts from the back, `-1` appends.
    pub index: isize,
    pub repeats: Option<u32>,
    pub repeat_separation: Option<Seconds>,
    pub plan_id: Option<i64>,
    pub hard: bool,
    /// Mirror the entry into the store. Ignored for ephemeral queues.
    pub persistent: bool,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            index: -1,
            repeats: None,
            repeat_separation: None,
            plan_id: None,
            hard: false,
            persistent: false,
        }
    }
}

/// Operator edit of a queued entry. `None` fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntryPatch {
    pub hard: Option<bool>,
    pub repeats: Option<Option<u32>>,
    pub repeat_separation: Option<Option<Seconds>>,
    pub window: Option<Window>,
}

/// A named [`TargetQueue`] with persistence, admission timers and published values.
///
/// Every mutating call ends by draining the queue journal. Removals reach the
/// store, the [`ValueSink`] and the [`QueueHistory`]. Updated entries are
/// rewritten in the store. A fresh [`QueueSnapshot`] is then published.
///
/// # Internal Structure
/// - `queue`: the ordering/filtering engine holding the entries
/// - `store` / `store_id`: optional [`QueueStore`]; a negative id keeps the queue in memory
/// - `timers`: receives one [`QueueEvent`] per new admission instant, memoised in `timer_armed`
/// - `history` / `snapshot`: removal logs and the last published values
///
/// # Examples
///
/// ```ignore
/// use skyqueue::executor::{EntryOptions, ExecutorQueue};
/// use skyqueue::queue::Window;
///
/// let mut executor = ExecutorQueue::new("plan", queue, timers).with_store(0, store);
/// executor.load()?;
///
/// executor.add_target(target, Window::unbounded(), EntryOptions::default());
/// executor.before_change(now);
/// if let Some(selection) = executor.select_next_observation(now, None, true) {
///     telescope.run(selection.target_id, selection.hard);
/// }
/// ```
pub struct ExecutorQueue<T: Target> {
    name: String,
    /// Non-negative ids are persisted, negative ones live in memory only.
    store_id: i32,
    queue: TargetQueue<T>,
    store: Option<Arc<dyn QueueStore>>,
    timers: Arc<dyn TimerService>,
    sink: Option<Arc<dyn ValueSink>>,
    clock: Arc<dyn Clock>,
    history: QueueHistory,
    snapshot: QueueSnapshot,
    /// Last admission instant a timer was armed for.
    timer_armed: Option<Seconds>,
}

impl<T: Target> ExecutorQueue<T> {
    pub fn new(name: impl Into<String>, queue: TargetQueue<T>, timers: Arc<dyn TimerService>) -> Self {
        let name = name.into();
        let history = QueueHistory::new(queue.config().history_limit);
        Self {
            snapshot: QueueSnapshot::empty(name.clone()),
            name,
            store_id: -1,
            queue,
            store: None,
            timers,
            sink: None,
            clock: Arc::new(SystemClock),
            history,
            timer_armed: None,
        }
    }

    pub fn with_store(mut self, store_id: i32, store: Arc<dyn QueueStore>) -> Self {
        self.store_id = store_id;
        self.store = Some(store);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ValueSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store_id(&self) -> i32 {
        self.store_id
    }

    /// True when entries can be mirrored into a store.
    pub fn is_persistent(&self) -> bool {
        self.store_id >= 0 && self.store.is_some()
    }

    pub fn queue(&self) -> &TargetQueue<T> {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn history(&self) -> &QueueHistory {
        &self.history
    }

    /// Values as last published.
    pub fn snapshot(&self) -> &QueueSnapshot {
        &self.snapshot
    }

    pub fn timer_armed(&self) -> Option<Seconds> {
        self.timer_armed
    }

    // =========================================================================
    // Adding entries
    // =========================================================================

    /// Inserts at `options.index`. Always succeeds; returns the new entry id.
    pub fn add_target(&mut self, target: T, window: Window, options: EntryOptions) -> Qid {
        let entry = self
            .queue
            .new_entry(target, window)
            .with_plan(options.plan_id)
            .with_hard(options.hard)
            .with_repeats(options.repeats, options.repeat_separation)
            .with_persistent(options.persistent && self.is_persistent());
        let qid = entry.qid();
        self.queue.insert(options.index, entry);
        self.persist_created(qid);
        self.sync(self.clock.now());
        qid
    }

    /// Head insertion bypassing the ordering policy (manual override).
    pub fn add_front(&mut self, target: T, window: Window) -> Qid {
        self.add_target(
            target,
            window,
            EntryOptions {
                index: 0,
                ..EntryOptions::default()
            },
        )
    }

    /// Inserts before the first entry the new target can be observed in front of,
    /// simulating a clock that runs through the queue from `now_hint` (or the
    /// window start). Falls back to the back of the queue.
    pub fn add_first(
        &mut self,
        target: T,
        ordering: FirstOrdering,
        now_hint: Option<Seconds>,
        window: Window,
        options: EntryOptions,
    ) -> Qid {
        let start = window
            .start()
            .or(now_hint)
            .unwrap_or_else(|| self.clock.now());
        let index = self
            .first_possible_position(&target, ordering, start)
            .map_or(-1, |pos| pos as isize);
        self.add_target(target, window, EntryOptions { index, ..options })
    }

    fn first_possible_position(&self, target: &T, ordering: FirstOrdering, start: Seconds) -> Option<usize> {
        let queue = &self.queue;
        let step = queue.config().visibility_step;
        let length = queue.script_length(target);
        let mut now = start;

        for (pos, entry) in queue.entries().iter().enumerate() {
            let to = entry.window().start().unwrap_or(now) + length;
            let satisfied = target.satisfied_duration(now, to, length, step);
            let skip = match ordering {
                FirstOrdering::None => false,
                FirstOrdering::HourAngle => {
                    target.hour_angle(now, queue.observer()).value()
                        < entry.target().hour_angle(now, queue.observer()).value()
                }
                FirstOrdering::SetFirst => {
                    satisfied.value()
                        > entry
                            .target()
                            .satisfied_duration(now, to, length, step)
                            .value()
                }
            };
            if !skip && SatisfiedSpan::classify(satisfied).is_usable() {
                return Some(pos);
            }

            let begins = entry
                .window()
                .start()
                .filter(|s| s.value() > now.value())
                .unwrap_or(now);
            let duration = queue.entry_duration(entry);
            now = begins + if duration.value() > 0.0 { duration } else { length };
        }
        None
    }

    // =========================================================================
    // Removing entries
    // =========================================================================

    /// Removes by logical position. The target is dropped unless it is current.
    pub fn remove_index(&mut self, index: isize) -> Result<RemovalRecord, QueueError> {
        let now = self.clock.now();
        let record = self.queue.remove_index(index, now)?;
        self.sync(now);
        Ok(record)
    }

    /// Empties the queue, detaching the current target if it is queued.
    pub fn clear_next(&mut self) {
        let now = self.clock.now();
        self.queue.clear(now);
        self.timer_armed = None;
        self.sync(now);
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Runs a full selection cycle: sort, requeue repeating front entry, filter.
    pub fn before_change(&mut self, now: Seconds) {
        self.queue.before_change(now);
        self.sync(now);
    }

    /// Picks the entry to execute now.
    ///
    /// Returns `None` for a disabled or empty queue, when the front entry is not
    /// ready, and when its script does not fit `max_length`. A front entry whose
    /// window has not opened yet arms a single admission timer instead.
    pub fn select_next_observation(
        &mut self,
        now: Seconds,
        max_length: Option<Seconds>,
        remove_observed: bool,
    ) -> Option<Selection> {
        if !self.queue.config().enabled || self.queue.is_empty() {
            return None;
        }
        let ready = self.queue.filter(now, max_length, remove_observed)
            && self.queue.front().is_some_and(|e| e.not_expired(now));
        let selection = if ready {
            self.take_front(max_length)
        } else {
            self.arm_timer(now);
            None
        };
        self.sync(now);
        selection
    }

    fn take_front(&mut self, max_length: Option<Seconds>) -> Option<Selection> {
        let check_length = self.queue.config().check_target_length;
        let front = self.queue.front()?;
        if let (Some(max), true) = (max_length, check_length) {
            let duration = self.queue.entry_duration(front);
            if !duration.value().is_nan() && duration.value() >= max.value() {
                log::debug!(
                    "{}: script of {} ({:.0} s) does not fit {:.0} s",
                    self.name,
                    front.target().name(),
                    duration.value(),
                    max.value()
                );
                return None;
            }
        }

        let front = self.queue.front_mut()?;
        // The hard flag only applies to time-committed entries and is consumed
        // by the first selection.
        let hard = front.window.start().is_some() && std::mem::take(&mut front.hard);
        let selection = Selection {
            target_id: front.target.id(),
            plan_id: front.plan_id,
            qid: front.qid,
            hard,
        };
        if hard && front.persistent {
            self.queue.note_update(selection.qid);
        }
        Some(selection)
    }

    fn arm_timer(&mut self, now: Seconds) {
        let Some(front) = self.queue.front() else {
            return;
        };
        let window = front.window();
        let horizon = now + self.queue.config().admission_margin;
        let armed = self.timer_armed;
        let due = |t: Option<Seconds>| {
            t.filter(|t| Some(*t) != armed && t.value() > horizon.value())
        };

        let event = if let Some(start) = due(window.start()) {
            QueueEvent::NextStart {
                queue: self.name.clone(),
                at: start,
            }
        } else if let Some(end) = due(window.end()) {
            QueueEvent::NextEnd {
                queue: self.name.clone(),
                at: end,
            }
        } else {
            return;
        };
        let at = event.at();
        log::debug!("{}: arming {:?} in {:.0} s", self.name, event, (at - now).value());
        self.timers.add_timer(at - now, event);
        self.timer_armed = Some(at);
    }

    /// Look-ahead view for a planning simulator. The live queue is not touched.
    pub fn simulation(&self) -> SimulationQueue<'_, T> {
        SimulationQueue::new(&self.queue)
    }

    /// Read-only analogue of [`select_next_observation`](Self::select_next_observation).
    pub fn select_next_simulation(
        &self,
        simulation: &mut SimulationQueue<'_, T>,
        from: Seconds,
        to: Seconds,
        current: Option<&EquPosition>,
    ) -> SimulationOutcome {
        simulation.select_next(from, to, current)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    pub fn revalidate_constraints(&mut self, watch_id: i32) {
        self.queue.revalidate_constraints(watch_id);
    }

    pub fn set_current(&mut self, qid: Option<Qid>) {
        self.queue.set_current(qid);
    }

    pub fn take_detached(&mut self) -> Vec<T> {
        self.queue.take_detached()
    }

    pub fn find_target(&self, target_id: TargetId) -> Option<usize> {
        self.queue.find_target(target_id)
    }

    pub fn order_by_target_list(&mut self, target_ids: &[TargetId]) {
        self.queue.order_by_target_list(target_ids);
        self.sync(self.clock.now());
    }

    pub fn front_time_expires(&self, now: Seconds) -> bool {
        self.queue.front_time_expires(now)
    }

    pub fn update_entry(&mut self, qid: Qid, patch: EntryPatch) -> Result<(), QueueError> {
        let entry = self
            .queue
            .entry_mut(qid)
            .ok_or(QueueError::UnknownEntry(qid))?;
        if let Some(hard) = patch.hard {
            entry.hard = hard;
        }
        if let Some(repeats) = patch.repeats {
            entry.repeats = repeats;
        }
        if let Some(separation) = patch.repeat_separation {
            entry.repeat_separation = separation;
        }
        if let Some(window) = patch.window {
            entry.window = window;
        }
        if entry.persistent {
            self.queue.note_update(qid);
        }
        self.sync(self.clock.now());
        Ok(())
    }

    pub fn set_policy(&mut self, policy: QueuePolicy) {
        self.queue.config_mut().policy = policy;
        self.sync(self.clock.now());
    }

    pub fn set_skip_below_horizon(&mut self, skip: bool) {
        self.queue.config_mut().skip_below_horizon = skip;
        self.sync(self.clock.now());
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.queue.config_mut().enabled = enabled;
        self.sync(self.clock.now());
    }

    pub fn set_remove_after_execution(&mut self, remove: bool) {
        self.queue.config_mut().remove_after_execution = remove;
        self.sync(self.clock.now());
    }

    // =========================================================================
    // Bulk reconcile
    // =========================================================================

    /// Queues targets from a `target_id [start end] [repeats separation]` token
    /// stream. Returns the number of requests that failed.
    pub fn queue_from_external_source<'a, I>(&mut self, tokens: I, options: BulkOptions) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut failed = 0;
        let mut index = options.index;
        for request in parse_target_requests(tokens, &options) {
            let request = match request {
                Ok(request) => request,
                Err(err) => {
                    log::warn!("{}: rejecting queue request: {}", self.name, err);
                    failed += 1;
                    continue;
                }
            };
            let Some(target) = self.create_target(request.target_id) else {
                failed += 1;
                continue;
            };
            let entry_options = EntryOptions {
                index,
                repeats: request.repeats,
                repeat_separation: request.repeat_separation,
                persistent: true,
                ..EntryOptions::default()
            };
            match options.first_possible {
                Some(ordering) => {
                    self.add_first(target, ordering, options.now_hint, request.window, entry_options);
                }
                None => {
                    self.add_target(target, request.window, entry_options);
                    if index >= 0 {
                        index += 1;
                    }
                }
            }
        }
        failed
    }

    /// Reconciles the queue with `qid target_id start end` records.
    ///
    /// The records define the new queue order. Qid 0 creates an entry, a
    /// positive qid updates that entry, a negative qid removes entry `-qid`.
    /// Entries not mentioned are removed. Returns the number of failed records.
    pub fn queue_from_external_source_by_id<'a, I>(&mut self, tokens: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let now = self.clock.now();
        let mut failed = 0;
        let mut old: Vec<Option<QueueEntry<T>>> =
            self.queue.take_entries().into_iter().map(Some).collect();
        let mut rebuilt = Vec::with_capacity(old.len());
        let mut created = Vec::new();

        for request in parse_entry_requests(tokens) {
            let request = match request {
                Ok(request) => request,
                Err(err) => {
                    log::warn!("{}: rejecting queue record: {}", self.name, err);
                    failed += 1;
                    continue;
                }
            };
            let existing = Self::claim(&mut old, request.qid.unsigned_abs());
            match (request.qid, existing) {
                (0, _) => match self.create_target(request.target_id) {
                    Some(target) => {
                        let entry = self
                            .queue
                            .new_entry(target, request.window)
                            .with_persistent(self.is_persistent());
                        created.push(entry.qid());
                        rebuilt.push(entry);
                    }
                    None => failed += 1,
                },
                (qid, Some(entry)) if qid < 0 => {
                    self.queue.retire(entry, RemovalReason::Deleted, now);
                }
                (_, Some(mut entry)) => {
                    if entry.target_id() != request.target_id {
                        match self.create_target(request.target_id) {
                            Some(target) => {
                                let (rebound, previous) = entry.rebind(target);
                                self.queue.dispose(rebound.qid(), previous);
                                entry = rebound;
                            }
                            None => failed += 1,
                        }
                    }
                    entry.window = request.window;
                    if entry.persistent {
                        self.queue.note_update(entry.qid());
                    }
                    rebuilt.push(entry);
                }
                (qid, None) => {
                    log::warn!("{}: {}", self.name, QueueError::UnknownEntry(qid.unsigned_abs()));
                    failed += 1;
                }
            }
        }

        for entry in old.into_iter().flatten() {
            self.queue.retire(entry, RemovalReason::Deleted, now);
        }
        self.queue.replace_entries(rebuilt);
        for qid in created {
            self.persist_created(qid);
        }
        self.sync(now);
        failed
    }

    fn claim(slots: &mut [Option<QueueEntry<T>>], qid: Qid) -> Option<QueueEntry<T>> {
        slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|e| e.qid() == qid))
            .and_then(Option::take)
    }

    fn create_target(&self, target_id: TargetId) -> Option<T> {
        let target = self
            .queue
            .factory()
            .create_target(target_id, self.queue.observer());
        if target.is_none() {
            log::warn!("{}: cannot create target {}", self.name, target_id);
        }
        target
    }

    // =========================================================================
    // Persistence and publishing
    // =========================================================================

    /// Appends the entries stored for this queue, in stored order.
    ///
    /// Entries that fail to load, or whose target cannot be created, are logged
    /// and skipped. Only a failure to list the stored ids is returned.
    pub fn load(&mut self) -> Result<usize, QueueError> {
        let store = match (&self.store, self.store_id >= 0) {
            (Some(store), true) => Arc::clone(store),
            _ => return Ok(0),
        };
        let ids = store.load_entry_ids(self.store_id)?;
        let total = ids.len();
        let mut loaded = 0;

        for qid in ids {
            self.queue.qids().observe(qid);
            let stored = match store.load_entry(qid) {
                Ok(stored) => stored,
                Err(err) => {
                    log::warn!("{}: skipping stored entry {}: {}", self.name, qid, err);
                    continue;
                }
            };
            let window = match stored.window() {
                Ok(window) => window,
                Err(err) => {
                    log::warn!("{}: skipping stored entry {}: {}", self.name, qid, err);
                    continue;
                }
            };
            let Some(target) = self.create_target(stored.target_id) else {
                continue;
            };
            let entry = QueueEntry::new(qid, target, window)
                .with_plan(stored.plan_id)
                .with_hard(stored.hard)
                .with_repeats(stored.repeats, stored.repeat_separation)
                .with_persistent(true);
            self.queue.push_back(entry);
            loaded += 1;
        }

        log::info!(
            "{}: loaded {} of {} stored entries",
            self.name,
            loaded,
            total
        );
        self.sync(self.clock.now());
        Ok(loaded)
    }

    fn persist_created(&self, qid: Qid) {
        let Some(store) = self.store.as_ref().filter(|_| self.store_id >= 0) else {
            return;
        };
        let Some(entry) = self.queue.entries().iter().find(|e| e.qid() == qid) else {
            return;
        };
        if !entry.is_persistent() {
            return;
        }
        if let Err(err) = store.create(self.store_id, &StoredEntry::from_entry(entry)) {
            log::warn!("{}: cannot store entry {}: {}", self.name, qid, err);
        }
    }

    /// Republishes the monitoring values.
    pub fn update_vals(&mut self) {
        self.sync(self.clock.now());
    }

    fn sync(&mut self, now: Seconds) {
        self.history.set_limit(self.queue.config().history_limit);
        for change in self.queue.drain_changes() {
            match change {
                QueueChange::Removed(record) => {
                    if record.persistent {
                        if let Some(store) = &self.store {
                            if let Err(err) = store.remove(record.qid) {
                                log::warn!(
                                    "{}: cannot remove stored entry {}: {}",
                                    self.name,
                                    record.qid,
                                    err
                                );
                            }
                        }
                    }
                    if let Some(sink) = &self.sink {
                        sink.publish_removal(&self.name, &record);
                    }
                    self.history.record(record);
                }
                QueueChange::Updated(qid) => {
                    let entry = self.queue.entries().iter().find(|e| e.qid() == qid);
                    if let (Some(store), Some(entry)) = (&self.store, entry) {
                        if let Err(err) = store.update(&StoredEntry::from_entry(entry)) {
                            log::warn!("{}: cannot update stored entry {}: {}", self.name, qid, err);
                        }
                    }
                }
            }
        }
        self.snapshot = QueueSnapshot::capture(&self.name, &self.queue, now);
        if let Some(sink) = &self.sink {
            sink.publish_queue(&self.snapshot);
        }
    }
}

impl<T: Target> Display for ExecutorQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.queue.config();
        write!(f, "queue {} policy {}", self.name, config.policy)?;
        if !config.enabled {
            write!(f, " (disabled)")?;
        }
        if self.store_id >= 0 {
            write!(f, " store {}", self.store_id)?;
        }
        writeln!(f)?;
        for entry in self.queue.entries() {
            writeln!(
                f,
                "{:>6} {:>6} {:<20} {}",
                entry.qid(),
                entry.target_id(),
                entry.target().name(),
                entry.window()
            )?;
        }
        Ok(())
    }
}
