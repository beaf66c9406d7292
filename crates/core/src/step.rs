//! Execution step state machine.
//!
//! Every execution records its progress as an append-only sequence of
//! [`Step`]s. Transitions are strictly forward and exactly one terminal
//! step closes the sequence.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

/// Status carried by a recorded [`Step`].
///
/// Valid transitions:
/// - `Prepare` -> `Running`
/// - `Prepare` -> `Failure` (input acquisition failed before launch)
/// - `Running` -> `Success`
/// - `Running` -> `Failure`
///
/// `Success` and `Failure` are terminal; no status is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Workdir acquired, input files being downloaded.
    Prepare,
    /// The underlying operation has started.
    Running,
    /// The operation completed and all output files were durably stored.
    Success,
    /// The operation failed, storage failed, or an input could not be
    /// downloaded. The step message carries the failure category.
    Failure,
}

impl ExecutionStatus {
    /// Whether this status closes the step sequence.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Whether a step with status `next` may follow a step with this status.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Prepare, Self::Running)
                | (Self::Prepare, Self::Failure)
                | (Self::Running, Self::Success)
                | (Self::Running, Self::Failure)
        )
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One recorded state transition of an execution.
///
/// Steps are append-only: once recorded they are never removed, reordered
/// or mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub status: ExecutionStatus,
    pub timestamp: Timestamp,
    pub message: Option<String>,
}

impl Step {
    /// Create a step with the current UTC timestamp.
    pub fn new(status: ExecutionStatus, message: impl Into<Option<String>>) -> Self {
        Self {
            status,
            timestamp: chrono::Utc::now(),
            message: message.into(),
        }
    }

    pub fn prepare(message: impl Into<String>) -> Self {
        Self::new(ExecutionStatus::Prepare, Some(message.into()))
    }

    pub fn running(message: impl Into<String>) -> Self {
        Self::new(ExecutionStatus::Running, Some(message.into()))
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ExecutionStatus::Success, Some(message.into()))
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(ExecutionStatus::Failure, Some(message.into()))
    }
}

// ---------------------------------------------------------------------------
// Sequence validation
// ---------------------------------------------------------------------------

/// Validate that `steps`, read in order, is a legal path through the state
/// machine: starts with `Prepare`, only forward transitions, and nothing
/// follows a terminal step.
///
/// An empty sequence is valid (the execution has not started yet).
pub fn validate_step_sequence(steps: &[Step]) -> Result<(), CoreError> {
    let mut previous: Option<ExecutionStatus> = None;
    for step in steps {
        match previous {
            None => {
                if step.status != ExecutionStatus::Prepare {
                    return Err(CoreError::InvalidStepTransition {
                        from: None,
                        to: step.status,
                    });
                }
            }
            Some(prev) if prev.is_terminal() => return Err(CoreError::SealedExecution),
            Some(prev) => {
                if !prev.can_transition_to(step.status) {
                    return Err(CoreError::InvalidStepTransition {
                        from: Some(prev),
                        to: step.status,
                    });
                }
            }
        }
        previous = Some(step.status);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ExecutionStatus::*;

    fn seq(statuses: &[ExecutionStatus]) -> Vec<Step> {
        statuses.iter().map(|s| Step::new(*s, None)).collect()
    }

    #[test]
    fn terminal_statuses() {
        assert!(!Prepare.is_terminal());
        assert!(!Running.is_terminal());
        assert!(Success.is_terminal());
        assert!(Failure.is_terminal());
    }

    #[test]
    fn forward_transitions_allowed() {
        assert!(Prepare.can_transition_to(Running));
        assert!(Prepare.can_transition_to(Failure));
        assert!(Running.can_transition_to(Success));
        assert!(Running.can_transition_to(Failure));
    }

    #[test]
    fn backward_and_skip_transitions_rejected() {
        assert!(!Running.can_transition_to(Prepare));
        assert!(!Running.can_transition_to(Running));
        assert!(!Prepare.can_transition_to(Success));
        assert!(!Success.can_transition_to(Failure));
        assert!(!Failure.can_transition_to(Running));
    }

    #[test]
    fn nominal_success_sequence_is_valid() {
        assert!(validate_step_sequence(&seq(&[Prepare, Running, Success])).is_ok());
    }

    #[test]
    fn nominal_failure_sequence_is_valid() {
        assert!(validate_step_sequence(&seq(&[Prepare, Running, Failure])).is_ok());
    }

    #[test]
    fn prepare_failure_sequence_is_valid() {
        // Input download failed before the operation launched.
        assert!(validate_step_sequence(&seq(&[Prepare, Failure])).is_ok());
    }

    #[test]
    fn empty_sequence_is_valid() {
        assert!(validate_step_sequence(&[]).is_ok());
    }

    #[test]
    fn sequence_must_start_with_prepare() {
        let err = validate_step_sequence(&seq(&[Running, Success])).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidStepTransition { from: None, to: Running }
        ));
    }

    #[test]
    fn nothing_may_follow_a_terminal_step() {
        let err = validate_step_sequence(&seq(&[Prepare, Running, Success, Failure])).unwrap_err();
        assert!(matches!(err, CoreError::SealedExecution));
    }

    #[test]
    fn step_constructors_set_status_and_message() {
        let step = Step::failure("process error: exit 1");
        assert_eq!(step.status, Failure);
        assert_eq!(step.message.as_deref(), Some("process error: exit 1"));
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Prepare).expect("serialize");
        assert_eq!(json, "\"PREPARE\"");
    }
}
