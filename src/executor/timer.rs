//! Admission timers and the time source of an executor queue.

use std::sync::mpsc::Sender;
use std::time::{SystemTime, UNIX_EPOCH};

use qtty::Seconds;

/// Typed event delivered back to the control loop when an admission timer fires.
///
/// Timers are advisory. A stale event only re-triggers selection, which is always
/// recomputed from the current queue state.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// The window of the front entry opens.
    NextStart { queue: String, at: Seconds },
    /// The window of the front entry closes.
    NextEnd { queue: String, at: Seconds },
}

impl QueueEvent {
    pub fn queue(&self) -> &str {
        match self {
            QueueEvent::NextStart { queue, .. } | QueueEvent::NextEnd { queue, .. } => queue,
        }
    }

    pub fn at(&self) -> Seconds {
        match self {
            QueueEvent::NextStart { at, .. } | QueueEvent::NextEnd { at, .. } => *at,
        }
    }
}

/// One-shot timers owned by the enclosing control loop.
pub trait TimerService: Send + Sync {
    fn add_timer(&self, delay: Seconds, event: QueueEvent);
}

/// Timers without a scheduler: the event goes straight into the control loop's
/// channel and the loop is expected to hold it until `event.at()`.
impl TimerService for Sender<QueueEvent> {
    fn add_timer(&self, delay: Seconds, event: QueueEvent) {
        log::debug!("posting {:?} due in {:.0} s", event, delay.value());
        if self.send(event).is_err() {
            log::warn!("timer event dropped, control loop is gone");
        }
    }
}

/// Source of "now" for selection.
pub trait Clock: Send + Sync {
    fn now(&self) -> Seconds;
}

/// Wall clock, seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Seconds {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Seconds::new(secs)
    }
}
