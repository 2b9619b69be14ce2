//! Queue ordering policies.

use std::fmt::Display;
use std::str::FromStr;

use super::error::QueueError;

/// How a [`TargetQueue`](super::TargetQueue) orders its entries before each selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QueuePolicy {
    /// Insertion order; time-committed entries supersede everything queued before them.
    #[default]
    Fifo,
    /// Insertion order; the front entry is rotated to the back after every cycle.
    Circular,
    /// Highest current altitude first.
    Altitude,
    /// Westmost (largest hour angle) first.
    WestEast,
    /// Greedy simulated walk preferring targets about to cross, or past, the meridian.
    WestEastMeridian,
    /// Greedy simulated walk preferring targets about to leave their limits.
    SoonestOutOfLimits,
}

impl QueuePolicy {
    pub const ALL: [QueuePolicy; 6] = [
        QueuePolicy::Fifo,
        QueuePolicy::Circular,
        QueuePolicy::Altitude,
        QueuePolicy::WestEast,
        QueuePolicy::WestEastMeridian,
        QueuePolicy::SoonestOutOfLimits,
    ];

    /// Numeric code of the policy, as used by operator interfaces.
    pub const fn code(&self) -> u8 {
        match self {
            QueuePolicy::Fifo => 0,
            QueuePolicy::Circular => 1,
            QueuePolicy::Altitude => 2,
            QueuePolicy::WestEast => 3,
            QueuePolicy::WestEastMeridian => 4,
            QueuePolicy::SoonestOutOfLimits => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Policies that reorder the queue before selection.
    pub const fn sorts(&self) -> bool {
        !matches!(self, QueuePolicy::Fifo | QueuePolicy::Circular)
    }

    /// Whether a front entry with `repeats` remaining goes to the back after a cycle.
    pub(crate) fn requeues_front(&self, repeats: Option<u32>) -> bool {
        match self {
            QueuePolicy::Circular => true,
            _ => repeats.is_some_and(|n| n > 1),
        }
    }
}

impl Display for QueuePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueuePolicy::Fifo => "FIFO",
            QueuePolicy::Circular => "CIRCULAR",
            QueuePolicy::Altitude => "HIGHEST",
            QueuePolicy::WestEast => "WESTEAST",
            QueuePolicy::WestEastMeridian => "WESTEAST_MERIDIAN",
            QueuePolicy::SoonestOutOfLimits => "OUT_OF_LIMITS",
        };
        f.write_str(name)
    }
}

impl FromStr for QueuePolicy {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| QueueError::UnknownPolicy(s.to_string()));
        }
        match trimmed.to_ascii_uppercase().replace('-', "_").as_str() {
            "FIFO" => Ok(QueuePolicy::Fifo),
            "CIRCULAR" => Ok(QueuePolicy::Circular),
            "HIGHEST" | "ALTITUDE" => Ok(QueuePolicy::Altitude),
            "WESTEAST" | "WEST_EAST" => Ok(QueuePolicy::WestEast),
            "WESTEAST_MERIDIAN" | "WEST_EAST_MERIDIAN" => Ok(QueuePolicy::WestEastMeridian),
            "OUT_OF_LIMITS" | "SOONEST_OUT_OF_LIMITS" => Ok(QueuePolicy::SoonestOutOfLimits),
            _ => Err(QueueError::UnknownPolicy(s.to_string())),
        }
    }
}
