//! Shared fixtures for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use qtty::{Degrees, Meters, Seconds};

use crate::executor::{Clock, ExecutorQueue, QueueEvent, QueueSnapshot, TimerService, ValueSink};
use crate::queue::{QidSequence, QueueConfig, RemovalRecord, TargetQueue};
use crate::target::{
    AltAz, EquPosition, Observer, OracleError, ScriptEstimator, Target, TargetFactory, TargetId,
};

/// Hour angle drift, degrees per second.
const SIDEREAL_RATE: f64 = 15.0 / 3600.0;

/// Scripted target. Its hour angle drifts from `ha` (at t = 0) at the sidereal rate.
#[derive(Debug, Clone)]
pub struct MockTarget {
    pub id: TargetId,
    pub name: String,
    pub priority: f64,
    pub ha: f64,
    pub alt: f64,
    pub visible_from: Option<f64>,
    pub visible_until: Option<f64>,
    pub constraints_ok: bool,
    pub satisfied: f64,
    pub started: bool,
    pub revalidated: Vec<i32>,
}

impl MockTarget {
    pub fn new(id: TargetId) -> Self {
        Self {
            id,
            name: format!("T{id}"),
            priority: 0.0,
            ha: -30.0,
            alt: 45.0,
            visible_from: None,
            visible_until: None,
            constraints_ok: true,
            satisfied: f64::INFINITY,
            started: false,
            revalidated: Vec::new(),
        }
    }

    pub fn with_ha(mut self, ha: f64) -> Self {
        self.ha = ha;
        self
    }

    pub fn with_alt(mut self, alt: f64) -> Self {
        self.alt = alt;
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_satisfied(mut self, satisfied: f64) -> Self {
        self.satisfied = satisfied;
        self
    }

    /// Below the horizon at all times.
    pub fn hidden(mut self) -> Self {
        self.alt = -20.0;
        self
    }

    pub fn visible_between(mut self, from: Option<f64>, until: Option<f64>) -> Self {
        self.visible_from = from;
        self.visible_until = until;
        self
    }

    pub fn violating(mut self) -> Self {
        self.constraints_ok = false;
        self
    }

    pub fn started(mut self) -> Self {
        self.started = true;
        self
    }

    fn visible_at(&self, at: f64) -> bool {
        self.visible_from.map_or(true, |f| at >= f) && self.visible_until.map_or(true, |u| at < u)
    }
}

impl Target for MockTarget {
    fn id(&self) -> TargetId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> f64 {
        self.priority
    }

    fn hour_angle(&self, at: Seconds, _observer: &Observer) -> Degrees {
        Degrees::new(self.ha + SIDEREAL_RATE * at.value())
    }

    fn position(&self, _at: Seconds) -> EquPosition {
        EquPosition::new(Degrees::new(self.id as f64), Degrees::new(10.0))
    }

    fn alt_az(&self, at: Seconds, _observer: &Observer) -> AltAz {
        let alt = if self.visible_at(at.value()) {
            self.alt
        } else {
            -10.0
        };
        AltAz::new(Degrees::new(alt), Degrees::new(180.0))
    }

    fn is_above_horizon(&self, position: &AltAz) -> bool {
        position.alt.value() > 0.0
    }

    fn violated_constraints(&self, _at: Seconds) -> Vec<String> {
        if self.constraints_ok {
            Vec::new()
        } else {
            vec!["airmass".to_string()]
        }
    }

    fn satisfied_duration(
        &self,
        _from: Seconds,
        _to: Seconds,
        _min_duration: Seconds,
        _step: Seconds,
    ) -> Seconds {
        Seconds::new(self.satisfied)
    }

    fn observation_started(&self) -> bool {
        self.started
    }

    fn revalidate_constraints(&mut self, watch_id: i32) {
        self.revalidated.push(watch_id);
    }
}

/// Catalogue-backed factory. Unknown ids yield `None`.
#[derive(Debug, Default)]
pub struct MockFactory {
    catalogue: Mutex<HashMap<TargetId, MockTarget>>,
}

impl MockFactory {
    pub fn new(targets: impl IntoIterator<Item = MockTarget>) -> Self {
        Self {
            catalogue: Mutex::new(targets.into_iter().map(|t| (t.id, t)).collect()),
        }
    }

    pub fn insert(&self, target: MockTarget) {
        self.catalogue.lock().unwrap().insert(target.id, target);
    }

    pub fn forget(&self, id: TargetId) {
        self.catalogue.lock().unwrap().remove(&id);
    }

    pub fn make(&self, id: TargetId) -> MockTarget {
        self.catalogue
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| MockTarget::new(id))
    }
}

impl TargetFactory<MockTarget> for MockFactory {
    fn create_target(&self, id: TargetId, _observer: &Observer) -> Option<MockTarget> {
        self.catalogue.lock().unwrap().get(&id).cloned()
    }
}

/// Script estimator with per-target durations.
#[derive(Debug)]
pub struct FixedEstimator {
    default: f64,
    durations: HashMap<TargetId, f64>,
    failing: HashSet<TargetId>,
}

impl FixedEstimator {
    pub fn new(default: f64) -> Self {
        Self {
            default,
            durations: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn with(mut self, id: TargetId, duration: f64) -> Self {
        self.durations.insert(id, duration);
        self
    }

    pub fn failing(mut self, id: TargetId) -> Self {
        self.failing.insert(id);
        self
    }
}

impl ScriptEstimator<MockTarget> for FixedEstimator {
    fn maximal_script_duration(
        &self,
        target: &MockTarget,
        _current: Option<&EquPosition>,
        _repeat_index: u32,
    ) -> Result<Seconds, OracleError> {
        if self.failing.contains(&target.id) {
            return Err(OracleError::MissingScript(target.id));
        }
        Ok(Seconds::new(
            self.durations.get(&target.id).copied().unwrap_or(self.default),
        ))
    }
}

#[derive(Debug, Default)]
pub struct RecordingTimers {
    pub armed: Mutex<Vec<(Seconds, QueueEvent)>>,
}

impl RecordingTimers {
    pub fn count(&self) -> usize {
        self.armed.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<(Seconds, QueueEvent)> {
        self.armed.lock().unwrap().last().cloned()
    }
}

impl TimerService for RecordingTimers {
    fn add_timer(&self, delay: Seconds, event: QueueEvent) {
        self.armed.lock().unwrap().push((delay, event));
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub snapshots: Mutex<Vec<QueueSnapshot>>,
    pub removals: Mutex<Vec<RemovalRecord>>,
}

impl RecordingSink {
    pub fn last_snapshot(&self) -> Option<QueueSnapshot> {
        self.snapshots.lock().unwrap().last().cloned()
    }

    pub fn removal_count(&self) -> usize {
        self.removals.lock().unwrap().len()
    }
}

impl ValueSink for RecordingSink {
    fn publish_queue(&self, snapshot: &QueueSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn publish_removal(&self, _queue: &str, record: &RemovalRecord) {
        self.removals.lock().unwrap().push(record.clone());
    }
}

#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<Seconds>,
}

impl FixedClock {
    pub fn new(now: f64) -> Self {
        Self {
            now: Mutex::new(Seconds::new(now)),
        }
    }

    pub fn set(&self, now: f64) {
        *self.now.lock().unwrap() = Seconds::new(now);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Seconds {
        *self.now.lock().unwrap()
    }
}

pub fn observer() -> Arc<Observer> {
    Arc::new(Observer::new(
        Degrees::new(-17.88),
        Degrees::new(28.76),
        Meters::new(2326.0),
    ))
}

pub fn secs(v: f64) -> Seconds {
    Seconds::new(v)
}

/// Queue over a catalogue of `targets` with a private qid sequence.
pub fn target_queue(
    config: QueueConfig,
    targets: &[MockTarget],
    estimator: FixedEstimator,
) -> (TargetQueue<MockTarget>, Arc<MockFactory>) {
    let factory = Arc::new(MockFactory::new(targets.iter().cloned()));
    let queue = TargetQueue::new(
        config,
        observer(),
        factory.clone(),
        Arc::new(estimator),
    )
    .with_qids(Arc::new(QidSequence::new()));
    (queue, factory)
}

/// Executor queue wired to recording collaborators.
pub struct Harness {
    pub executor: ExecutorQueue<MockTarget>,
    pub factory: Arc<MockFactory>,
    pub timers: Arc<RecordingTimers>,
    pub sink: Arc<RecordingSink>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new(config: QueueConfig, targets: &[MockTarget], estimator: FixedEstimator) -> Self {
        let (queue, factory) = target_queue(config, targets, estimator);
        let timers = Arc::new(RecordingTimers::default());
        let sink = Arc::new(RecordingSink::default());
        let clock = Arc::new(FixedClock::new(0.0));
        let executor = ExecutorQueue::new("main", queue, timers.clone())
            .with_sink(sink.clone())
            .with_clock(clock.clone());
        Self {
            executor,
            factory,
            timers,
            sink,
            clock,
        }
    }

    pub fn target(&self, id: TargetId) -> MockTarget {
        self.factory.make(id)
    }
}
