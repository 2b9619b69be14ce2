//! Classification of satisfied-duration sentinels.

use qtty::Seconds;
use std::cmp::Ordering;

/// How long a target stays within its limits, as reported by
/// [`Target::satisfied_duration`](super::Target::satisfied_duration).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SatisfiedSpan {
    /// Constraints hold for this long, then the target goes out of limits.
    For(Seconds),
    /// Constraints hold for the whole checked period (`+Inf`).
    Always,
    /// Constraints do not hold now, or the oracle had no data (`NaN`).
    Never,
}

impl SatisfiedSpan {
    pub fn classify(duration: Seconds) -> Self {
        let v = duration.value();
        if v.is_nan() {
            SatisfiedSpan::Never
        } else if v.is_infinite() {
            SatisfiedSpan::Always
        } else {
            SatisfiedSpan::For(duration)
        }
    }

    /// Class order used by soonest-out-of-limits sorting: setting targets first,
    /// then always visible ones, then never visible ones.
    pub(crate) const fn rank(&self) -> u8 {
        match self {
            SatisfiedSpan::For(_) => 0,
            SatisfiedSpan::Always => 1,
            SatisfiedSpan::Never => 2,
        }
    }

    /// Compares two spans. `None` means both are in the same sentinel class and
    /// the caller must break the tie itself.
    pub(crate) fn compare(&self, other: &SatisfiedSpan) -> Option<Ordering> {
        match (self, other) {
            (SatisfiedSpan::For(a), SatisfiedSpan::For(b)) => {
                match a.value().total_cmp(&b.value()) {
                    Ordering::Equal => None,
                    ord => Some(ord),
                }
            }
            _ if self.rank() == other.rank() => None,
            _ => Some(self.rank().cmp(&other.rank())),
        }
    }

    /// True for a non-zero finite span or an infinite one.
    pub fn is_usable(&self) -> bool {
        match self {
            SatisfiedSpan::For(d) => d.value() != 0.0,
            SatisfiedSpan::Always => true,
            SatisfiedSpan::Never => false,
        }
    }
}
