//! Configuration of a target queue.

use qtty::Seconds;

use super::policy::QueuePolicy;

/// Ordering and filtering switches of a [`TargetQueue`](super::TargetQueue).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueConfig {
    pub policy: QueuePolicy,

    // --- Filtering ---
    /// Keep unobservable entries (moved behind the front) instead of removing them.
    pub skip_below_horizon: bool,
    /// Test full constraint satisfaction, not only the geometric horizon.
    pub test_constraints: bool,
    /// Remove entries once their observation has started (run the script once).
    pub remove_after_execution: bool,
    /// Do not reorder or drop anything while the front entry is not visible.
    pub block_until_visible: bool,
    /// Refuse a front entry whose script does not fit the requested length.
    pub check_target_length: bool,

    // --- Selection ---
    /// Disabled queues never produce a candidate.
    pub enabled: bool,
    /// Admission instants closer than this are left to the next idle re-check
    /// instead of arming a timer.
    pub admission_margin: Seconds,

    // --- Oracle queries ---
    /// Step used when stepping through constraint satisfaction.
    pub visibility_step: Seconds,
    /// Look-ahead of the soonest-out-of-limits ordering.
    pub out_of_limits_horizon: Seconds,
    /// Script length assumed when the estimator cannot tell.
    pub default_script_length: Seconds,

    // --- Monitoring ---
    /// Maximal number of records kept in each removed/executed history log.
    pub history_limit: usize,
}

impl QueueConfig {
    pub fn with_policy(policy: QueuePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            policy: QueuePolicy::Fifo,
            skip_below_horizon: true,
            test_constraints: true,
            remove_after_execution: true,
            block_until_visible: false,
            check_target_length: true,
            enabled: true,
            admission_margin: Seconds::new(60.0),
            visibility_step: Seconds::new(60.0),
            out_of_limits_horizon: Seconds::new(86400.0),
            default_script_length: Seconds::new(60.0),
            history_limit: 100,
        }
    }
}
