//! Observation targets as seen by the queue.
//!
//! Targets are owned and created outside this crate. The queue only asks them
//! questions: where they are, whether they are above the horizon, whether their
//! constraints hold and for how long.

mod observer;
mod oracle;
mod visibility;

pub use observer::Observer;
pub use oracle::{OracleError, ScriptEstimator, TargetFactory};
pub use visibility::SatisfiedSpan;

use qtty::{Degrees, Seconds};
use std::fmt::Debug;

/// Target identifier, as assigned by the target catalogue.
pub type TargetId = i32;

/// Horizontal (altitude/azimuth) position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AltAz {
    pub alt: Degrees,
    pub az: Degrees,
}

impl AltAz {
    pub const fn new(alt: Degrees, az: Degrees) -> Self {
        Self { alt, az }
    }

    /// Returns false when the altitude could not be computed (missing ephemeris data).
    pub fn is_defined(&self) -> bool {
        !self.alt.value().is_nan()
    }
}

/// Equatorial (right ascension/declination) position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EquPosition {
    pub ra: Degrees,
    pub dec: Degrees,
}

impl EquPosition {
    pub const fn new(ra: Degrees, dec: Degrees) -> Self {
        Self { ra, dec }
    }
}

/// Visibility and constraint oracle for a single observation target.
///
/// # Contract
///
/// Every query is a pure, synchronous geometric computation. Implementations must
/// never block or panic on missing data; they report it through sentinels instead:
///
/// - [`alt_az`](Self::alt_az) returns a `NaN` altitude when the position is unknown
/// - [`satisfied_duration`](Self::satisfied_duration) returns `NaN` when the constraints
///   are not satisfied at `from`, and `+Inf` when they hold until `to`
pub trait Target: Debug + Send + Sync + 'static {
    fn id(&self) -> TargetId;

    fn name(&self) -> &str;

    /// Scheduling priority; higher values are more important.
    fn priority(&self) -> f64 {
        0.0
    }

    /// Local hour angle at `at`. Positive values are west of the meridian.
    fn hour_angle(&self, at: Seconds, observer: &Observer) -> Degrees;

    /// Equatorial position at `at`.
    fn position(&self, at: Seconds) -> EquPosition;

    /// Horizontal position at `at` for the given observer.
    fn alt_az(&self, at: Seconds, observer: &Observer) -> AltAz;

    /// Geometric horizon test for an already computed horizontal position.
    fn is_above_horizon(&self, position: &AltAz) -> bool;

    /// Names of the constraints violated at `at`. Empty means all are satisfied.
    fn violated_constraints(&self, _at: Seconds) -> Vec<String> {
        Vec::new()
    }

    /// Length of the period, starting at `from + min_duration` and checked in `step`
    /// increments up to `to`, during which the constraints stay satisfied.
    fn satisfied_duration(
        &self,
        from: Seconds,
        to: Seconds,
        min_duration: Seconds,
        step: Seconds,
    ) -> Seconds;

    /// Returns true once an observation of this target has started.
    fn observation_started(&self) -> bool {
        false
    }

    /// Notifies the target that the constraint set watched by `watch_id` changed.
    fn revalidate_constraints(&mut self, _watch_id: i32) {}
}
