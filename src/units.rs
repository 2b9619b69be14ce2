//! Time and angle helpers over `qtty` quantities.
//!
//! Instants are expressed as [`Seconds`] since the Unix epoch, durations as
//! [`Seconds`], hour angles and altitudes as [`Degrees`]. Oracle sentinels
//! (`NaN` for "never"/"unknown", `+Inf` for "always") travel inside the
//! quantity value.

use qtty::{Degrees, Hour, Hours, Quantity, Second, Seconds, Unit};

/// Marker trait for units that share the same physical dimension.
///
/// Automatically implemented for any pair of units where `From::Dim == To::Dim`.
pub trait SameDim<To: Unit>: Unit<Dim = To::Dim> {}

impl<From, To> SameDim<To> for From
where
    From: Unit,
    To: Unit<Dim = From::Dim>,
{
}

/// Converts a quantity from one unit to another unit of the same dimension.
#[inline]
pub const fn convert<From, To>(q: Quantity<From>) -> Quantity<To>
where
    From: SameDim<To>,
    To: Unit,
{
    q.to_const::<To>()
}

/// Degrees of hour angle swept per hour of time.
pub const DEGREES_PER_HOUR: f64 = 15.0;

/// Shorthand for building an instant or duration in seconds.
#[inline]
pub const fn secs(value: f64) -> Seconds {
    Seconds::new(value)
}

/// Expresses a duration in hours.
#[inline]
pub const fn to_hours(duration: Seconds) -> Hours {
    convert::<Second, Hour>(duration)
}

/// Expresses an hour angle in hours (15° per hour).
#[inline]
pub fn hour_angle_hours(hour_angle: Degrees) -> f64 {
    hour_angle.value() / DEGREES_PER_HOUR
}

/// Returns true if the quantity carries a finite value (not a sentinel).
#[inline]
pub fn is_finite<U: Unit>(q: Quantity<U>) -> bool {
    q.value().is_finite()
}

/// Replaces an unknown (`NaN`) duration with zero.
#[inline]
pub fn known_or_zero(duration: Seconds) -> Seconds {
    if duration.value().is_nan() {
        Seconds::new(0.0)
    } else {
        duration
    }
}

/// Total order over quantity values, `NaN` sorting after everything.
pub fn total_cmp<U: Unit>(a: Quantity<U>, b: Quantity<U>) -> std::cmp::Ordering {
    match (a.value().is_nan(), b.value().is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.value().total_cmp(&b.value()),
    }
}
