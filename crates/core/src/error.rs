use crate::step::ExecutionStatus;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid step transition: {from:?} -> {to:?}")]
    InvalidStepTransition {
        /// Status of the last recorded step; `None` when the sequence is empty.
        from: Option<ExecutionStatus>,
        to: ExecutionStatus,
    },

    #[error("Execution is sealed: a terminal step was already recorded")]
    SealedExecution,

    #[error("Internal error: {0}")]
    Internal(String),
}
