//! Engine error taxonomy.
//!
//! Failures during a run are tagged with an explicit [`FailureKind`] so the
//! terminal step's message distinguishes "the script failed" from "the
//! script succeeded but its results could not be stored" (and from input
//! acquisition and timeout failures). Configuration problems are detected
//! before execution starts and surface synchronously as [`EngineError`];
//! they never reach the step-publish protocol.

use pyxis_storage::error::StorageError;

use crate::publisher::PublishError;

// ---------------------------------------------------------------------------
// FailureKind
// ---------------------------------------------------------------------------

/// Category of a run failure, rendered as a stable prefix in the terminal
/// `Failure` step's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// An input file could not be downloaded.
    InputDownload,
    /// The underlying operation exited abnormally or could not be spawned.
    Process,
    /// The operation succeeded but its results could not be persisted.
    Store,
    /// A stage exceeded the execution's allotted duration.
    Timeout,
    /// An unexpected engine-side fault.
    Internal,
}

impl FailureKind {
    /// Stable message prefix for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            Self::InputDownload => "input download error",
            Self::Process => "process error",
            Self::Store => "store error",
            Self::Timeout => "timed out",
            Self::Internal => "internal error",
        }
    }
}

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

/// A failure of one run, caught by the engine and converted into the
/// terminal `Failure` step.
#[derive(Debug, thiserror::Error)]
#[error("{}: {message}", .kind.tag())]
pub struct RunError {
    pub kind: FailureKind,
    pub message: String,
}

impl RunError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn download(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InputDownload, message)
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Process, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Store, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }
}

impl From<PublishError> for RunError {
    fn from(e: PublishError) -> Self {
        Self::internal(format!("step publication failed: {e}"))
    }
}

// ---------------------------------------------------------------------------
// ExecutableError
// ---------------------------------------------------------------------------

/// Outcome of [`crate::executable::Executable::execute`] when a run does
/// not reach its success terminal.
#[derive(Debug, thiserror::Error)]
pub enum ExecutableError {
    /// Handled failure: the engine publishes a `Failure` step and the
    /// asynchronous result still completes normally.
    #[error(transparent)]
    Run(#[from] RunError),

    /// Unrecoverable fault (workdir allocation exhausted); the one case
    /// allowed to propagate through the engine's result channel.
    #[error("workdir unavailable: {0}")]
    WorkdirUnavailable(String),
}

impl From<StorageError> for ExecutableError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Workdir { .. } => Self::WorkdirUnavailable(e.to_string()),
            StorageError::Download { .. }
            | StorageError::UnsupportedUrl { .. }
            | StorageError::UnsafeFilename { .. } => Self::Run(RunError::download(e.to_string())),
            StorageError::Store { .. } => Self::Run(RunError::store(e.to_string())),
            StorageError::Io(_) => Self::Run(RunError::internal(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors surfaced synchronously to the submitting caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The process definition is unusable (bad plugin config, unusable
    /// forecasts); detected before execution starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No engine is registered under the requested name.
    #[error("No workload engine registered under name '{0}'")]
    UnknownEngine(String),

    /// Workdir allocation failed; the one execute-level fault.
    #[error("Workdir unavailable: {0}")]
    WorkdirUnavailable(String),

    #[error("Internal engine error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
