//! External collaborators consulted by the queue.

use qtty::Seconds;
use thiserror::Error;

use super::{EquPosition, Observer, Target, TargetId};

/// Recoverable failure reported by an external estimator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("Cannot estimate script duration of target {target}: {reason}")]
    Estimate { target: TargetId, reason: String },

    #[error("No script defined for target {0}")]
    MissingScript(TargetId),
}

/// Creates targets from catalogue identifiers.
///
/// Returning `None` means the identifier is unknown; callers log and drop the request.
pub trait TargetFactory<T: Target>: Send + Sync {
    fn create_target(&self, id: TargetId, observer: &Observer) -> Option<T>;
}

/// Estimates how long the observing script of a target will run.
pub trait ScriptEstimator<T: Target>: Send + Sync {
    /// Maximal script duration.
    ///
    /// `current` is the telescope position the script would start from, when known;
    /// `repeat_index` is the number of times the target was already executed.
    fn maximal_script_duration(
        &self,
        target: &T,
        current: Option<&EquPosition>,
        repeat_index: u32,
    ) -> Result<Seconds, OracleError>;
}
