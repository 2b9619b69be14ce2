//! Ordering policies: comparators and greedy simulated walks.
//!
//! Every ordering produces a permutation of queue indices which
//! [`TargetQueue::sort_queue`](super::TargetQueue::sort_queue) applies in one step.
//! Keys are computed once per pass so comparators stay total orders.
//!
//! # Greedy walks
//!
//! `WEST_EAST_MERIDIAN` and `SOONEST_OUT_OF_LIMITS` do not sort with a fixed key.
//! They simulate the night instead:
//!
//! 1. rank the entries not yet placed at the simulated clock
//! 2. pick the first visible one whose hour angle plus script duration reaches
//!    the meridian; without such an entry, pick the first ranked one
//! 3. advance the clock by the picked entry's script duration and repeat
//!
//! While scanning, the clock also jumps to the window start of every visible
//! candidate whose window opens later.

use std::cmp::Ordering;

use qtty::{Degrees, Seconds};

use super::{QueueEntry, TargetQueue};
use crate::target::{AltAz, SatisfiedSpan, Target};
use crate::units::{hour_angle_hours, known_or_zero, to_hours};

/// Higher altitude first. Undefined altitudes go last.
pub fn compare_altitude(a: &AltAz, b: &AltAz) -> Ordering {
    match (a.is_defined(), b.is_defined()) {
        (true, true) => b.alt.value().total_cmp(&a.alt.value()),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// Westmost (largest hour angle) first. Undefined hour angles go last.
pub fn compare_west_east(a: Degrees, b: Degrees) -> Ordering {
    match (a.value().is_nan(), b.value().is_nan()) {
        (false, false) => b.value().total_cmp(&a.value()),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    }
}

/// Ranking key of the meridian walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeridianKey {
    pub priority: f64,
    pub hour_angle: Degrees,
}

/// Higher priority first, then west to east.
pub fn compare_meridian(a: &MeridianKey, b: &MeridianKey) -> Ordering {
    b.priority
        .total_cmp(&a.priority)
        .then_with(|| compare_west_east(a.hour_angle, b.hour_angle))
}

/// Ranking key of the out-of-limits walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutOfLimitsKey {
    pub span: SatisfiedSpan,
    pub hour_angle: Degrees,
}

/// Soonest to leave its limits first; within a sentinel class, west to east.
pub fn compare_out_of_limits(a: &OutOfLimitsKey, b: &OutOfLimitsKey) -> Ordering {
    a.span
        .compare(&b.span)
        .unwrap_or_else(|| compare_west_east(a.hour_angle, b.hour_angle))
}

/// True if a target at `hour_angle` reaches the meridian within `duration`.
pub fn crosses_meridian(hour_angle: Degrees, duration: Seconds) -> bool {
    hour_angle_hours(hour_angle) + to_hours(known_or_zero(duration)).value() > 0.0
}

pub(crate) fn by_altitude<T: Target>(queue: &TargetQueue<T>, now: Seconds) -> Vec<usize> {
    let mut keyed: Vec<(usize, AltAz)> = queue
        .entries()
        .iter()
        .enumerate()
        .map(|(i, e)| (i, e.target.alt_az(now, queue.observer())))
        .collect();
    keyed.sort_by(|a, b| compare_altitude(&a.1, &b.1));
    keyed.into_iter().map(|(i, _)| i).collect()
}

pub(crate) fn by_west_east<T: Target>(queue: &TargetQueue<T>, now: Seconds) -> Vec<usize> {
    let mut keyed: Vec<(usize, Degrees)> = queue
        .entries()
        .iter()
        .enumerate()
        .map(|(i, e)| (i, e.target.hour_angle(now, queue.observer())))
        .collect();
    keyed.sort_by(|a, b| compare_west_east(a.1, b.1));
    keyed.into_iter().map(|(i, _)| i).collect()
}

pub(crate) fn meridian_walk<T: Target>(queue: &TargetQueue<T>, now: Seconds) -> Vec<usize> {
    greedy_walk(
        queue,
        now,
        |entry, clock| MeridianKey {
            priority: entry.target.priority(),
            hour_angle: entry.target.hour_angle(clock, queue.observer()),
        },
        compare_meridian,
    )
}

pub(crate) fn out_of_limits_walk<T: Target>(queue: &TargetQueue<T>, now: Seconds) -> Vec<usize> {
    let config = queue.config();
    greedy_walk(
        queue,
        now,
        |entry, clock| OutOfLimitsKey {
            span: SatisfiedSpan::classify(entry.target.satisfied_duration(
                clock,
                clock + config.out_of_limits_horizon,
                Seconds::new(0.0),
                config.visibility_step,
            )),
            hour_angle: entry.target.hour_angle(clock, queue.observer()),
        },
        compare_out_of_limits,
    )
}

fn greedy_walk<T, K, F, C>(queue: &TargetQueue<T>, now: Seconds, key: F, compare: C) -> Vec<usize>
where
    T: Target,
    F: Fn(&QueueEntry<T>, Seconds) -> K,
    C: Fn(&K, &K) -> Ordering,
{
    let entries = queue.entries();
    let mut remaining: Vec<usize> = (0..entries.len()).collect();
    let mut order = Vec::with_capacity(entries.len());
    let mut clock = now;

    while !remaining.is_empty() {
        let mut keyed: Vec<(usize, K)> = remaining
            .iter()
            .map(|&i| (i, key(&entries[i], clock)))
            .collect();
        keyed.sort_by(|a, b| compare(&a.1, &b.1));
        remaining = keyed.into_iter().map(|(i, _)| i).collect();

        let mut pick = None;
        for (pos, &idx) in remaining.iter().enumerate() {
            let entry = &entries[idx];
            let mut at = clock;
            if !queue.is_above_horizon(entry, &mut at) {
                continue;
            }
            // Every visible candidate with a future window start moves the
            // clock forward to it, picked or not.
            clock = at;
            let duration = queue.entry_duration(entry);
            if crosses_meridian(entry.target.hour_angle(clock, queue.observer()), duration) {
                pick = Some(pos);
                break;
            }
        }

        let idx = remaining.remove(pick.unwrap_or(0));
        let entry = &entries[idx];
        clock = clock + known_or_zero(queue.entry_duration(entry));
        log::debug!(
            "walk placed {} ({}) qid {}, clock now {:.0}",
            entry.target.name(),
            entry.target.id(),
            entry.qid,
            clock.value()
        );
        order.push(idx);
    }

    order
}
