//! Error types for the Wayfarer domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Wayfarer operations.
///
/// Interaction failures reach it through [`TaskError::InteractionFailed`].
#[derive(Debug, Error)]
pub enum Error {
    // --- Mover errors ---
    #[error("Mover error: {0}")]
    Mover(#[from] MoverError),

    // --- Task errors ---
    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the motion subsystem itself. These are unexpected and
/// propagate as hard errors, unlike routine pursuit outcomes.
#[derive(Debug, Clone, Error)]
pub enum MoverError {
    #[error("Mover disconnected")]
    Disconnected,

    #[error("Goal rejected: {0}")]
    GoalRejected(String),

    #[error("Mover failure: {0}")]
    Internal(String),
}

/// A post-arrival action (dig, craft, open, ...) failed.
#[derive(Debug, Clone, Error)]
pub enum InteractionError {
    #[error("{action} failed: {reason}")]
    Failed { action: String, reason: String },

    #[error("{action} timed out after {timeout_ms}ms")]
    Timeout { action: String, timeout_ms: u64 },

    #[error("Unknown {kind}: {name}")]
    Unknown { kind: String, name: String },
}

impl InteractionError {
    pub fn failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

/// Failure taxonomy for goal-directed tasks.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("Cannot find path to {target} - no path exists")]
    NoPath { target: String },

    #[error("Timed out after {elapsed_ms}ms going to {target}, distance remaining: {distance:.1}")]
    Timeout {
        target: String,
        elapsed_ms: u64,
        distance: f64,
    },

    #[error("Stuck for {elapsed_ms}ms going to {target}, distance remaining: {distance:.1}")]
    Stuck {
        target: String,
        distance: f64,
        elapsed_ms: u64,
    },

    #[error("Target vanished: {0}")]
    TargetVanished(String),

    #[error("Interaction failed: {0}")]
    InteractionFailed(#[from] InteractionError),

    #[error("Precondition unmet: {0}")]
    PreconditionUnmet(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cancelled before completion")]
    Cancelled,

    #[error("Agent is busy with another activity")]
    Busy,

    #[error("All {attempts} attempt(s) failed; last error: {last}")]
    Exhausted { attempts: usize, last: Box<TaskError> },
}

impl TaskError {
    /// Stable snake_case label reported to callers as `reason`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoPath { .. } => "no_path",
            Self::Timeout { .. } => "timeout",
            Self::Stuck { .. } => "stuck",
            Self::TargetVanished(_) => "target_vanished",
            Self::InteractionFailed(_) => "interaction_failed",
            Self::PreconditionUnmet(_) => "precondition_unmet",
            Self::NotFound(_) => "not_found",
            Self::Cancelled => "cancelled",
            Self::Busy => "busy",
            Self::Exhausted { .. } => "exhausted",
        }
    }

    /// The innermost error for aggregates, `self` otherwise.
    pub fn root(&self) -> &TaskError {
        match self {
            Self::Exhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_path_message_names_failure_kind() {
        let err = TaskError::NoPath {
            target: "(100, 64, 100)".into(),
        };
        assert!(err.to_string().contains("no path"));
        assert!(err.to_string().contains("(100, 64, 100)"));
    }

    #[test]
    fn exhausted_reports_last_error() {
        let err = TaskError::Exhausted {
            attempts: 3,
            last: Box::new(TaskError::TargetVanished("oak_log at (1, 2, 3)".into())),
        };
        assert!(err.to_string().contains("3 attempt"));
        assert!(err.to_string().contains("oak_log"));
        assert_eq!(err.kind(), "exhausted");
        assert_eq!(err.root().kind(), "target_vanished");
    }

    #[test]
    fn interaction_errors_convert_through_task_error() {
        let err = Error::from(TaskError::from(InteractionError::failed("open", "jammed")));
        assert!(matches!(
            err,
            Error::Task(TaskError::InteractionFailed(InteractionError::Failed { .. }))
        ));
        assert!(err.to_string().starts_with("Task error:"));
    }

    #[test]
    fn interaction_error_displays_correctly() {
        let err = Error::Task(TaskError::InteractionFailed(InteractionError::failed(
            "dig",
            "tool broke",
        )));
        assert!(err.to_string().contains("dig"));
        assert!(err.to_string().contains("tool broke"));
    }
}
