//! Step-publish actor.
//!
//! A dedicated task holds exclusive ownership of an execution's mutable
//! record. All progress reports go through its mailbox, which serializes
//! them: the N-th published step is appended only after the (N-1)-th is
//! reflected in the accumulated state, with no lost updates and no
//! reordering. A step and the output files attached to the same event are
//! applied atomically; a reader observes both or neither.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use pyxis_core::error::CoreError;
use pyxis_core::execution::Execution;
use pyxis_core::file::OutputFile;
use pyxis_core::step::{ExecutionStatus, Step};

use crate::events::{ExecutionEvent, EVENT_CHANNEL_CAPACITY};

/// Mailbox capacity of the updater task. Publishes are few (a handful per
/// run) and awaited by their callers, so a small buffer suffices.
const REQUEST_CHANNEL_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// StepEvent
// ---------------------------------------------------------------------------

/// One progress report: an optional new step and the output files produced
/// with it.
#[derive(Debug, Clone, Default)]
pub struct StepEvent {
    pub step: Option<Step>,
    pub output_files: Vec<OutputFile>,
}

impl StepEvent {
    pub fn step(step: Step) -> Self {
        Self {
            step: Some(step),
            output_files: Vec::new(),
        }
    }

    pub fn step_with_outputs(step: Step, output_files: Vec<OutputFile>) -> Self {
        Self {
            step: Some(step),
            output_files,
        }
    }

    pub fn outputs(output_files: Vec<OutputFile>) -> Self {
        Self {
            step: None,
            output_files,
        }
    }
}

// ---------------------------------------------------------------------------
// PublishError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("execution is sealed: a terminal step was already recorded")]
    Sealed,

    #[error("invalid step transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: Option<ExecutionStatus>,
        to: ExecutionStatus,
    },

    #[error("the execution updater is gone")]
    Closed,
}

// ---------------------------------------------------------------------------
// ExecutionUpdater
// ---------------------------------------------------------------------------

enum UpdaterRequest {
    Publish {
        event: StepEvent,
        reply: oneshot::Sender<Result<Execution, PublishError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Execution>,
    },
}

/// Cloneable handle on the step-publish actor.
///
/// Dropping every handle ends the actor; its join handle then yields the
/// final execution record.
#[derive(Clone)]
pub struct ExecutionUpdater {
    tx: mpsc::Sender<UpdaterRequest>,
    events: broadcast::Sender<ExecutionEvent>,
}

impl ExecutionUpdater {
    /// Spawn the actor owning `execution`.
    pub fn spawn(execution: Execution) -> (Self, JoinHandle<Execution>) {
        let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let join = tokio::spawn(updater_loop(execution, rx, events.clone()));
        (Self { tx, events }, join)
    }

    /// Publish one step event and await the updated execution snapshot.
    ///
    /// Completion of the returned future only means the event is reflected
    /// in the accumulated state; no execution-wide lock is held while the
    /// caller goes on working.
    pub async fn publish(&self, event: StepEvent) -> Result<Execution, PublishError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(UpdaterRequest::Publish { event, reply })
            .await
            .map_err(|_| PublishError::Closed)?;
        response.await.map_err(|_| PublishError::Closed)?
    }

    /// Read the current accumulated execution state.
    pub async fn snapshot(&self) -> Result<Execution, PublishError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(UpdaterRequest::Snapshot { reply })
            .await
            .map_err(|_| PublishError::Closed)?;
        response.await.map_err(|_| PublishError::Closed)
    }

    /// Subscribe to the mirrored lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.events.subscribe()
    }
}

async fn updater_loop(
    mut execution: Execution,
    mut rx: mpsc::Receiver<UpdaterRequest>,
    events: broadcast::Sender<ExecutionEvent>,
) -> Execution {
    while let Some(request) = rx.recv().await {
        match request {
            UpdaterRequest::Publish { event, reply } => {
                let result = apply_event(&mut execution, event, &events);
                let _ = reply.send(result.map(|_| execution.clone()));
            }
            UpdaterRequest::Snapshot { reply } => {
                let _ = reply.send(execution.clone());
            }
        }
    }
    execution
}

/// Apply one event to the owned record: the step append and the output
/// merge happen together or not at all.
fn apply_event(
    execution: &mut Execution,
    event: StepEvent,
    events: &broadcast::Sender<ExecutionEvent>,
) -> Result<(), PublishError> {
    // Output files are only ever produced strictly before the terminal
    // step, so even an outputs-only event is rejected once sealed.
    if execution.is_sealed() {
        return Err(PublishError::Sealed);
    }

    let new_output_files = event.output_files.len();
    match event.step {
        Some(step) => {
            let status = step.status;
            let message = step.message.clone();
            execution.record_step(step).map_err(|e| match e {
                CoreError::SealedExecution => PublishError::Sealed,
                CoreError::InvalidStepTransition { from, to } => {
                    PublishError::InvalidTransition { from, to }
                }
                other => {
                    // record_step only returns the two variants above.
                    tracing::error!(error = %other, "Unexpected step record error");
                    PublishError::Closed
                }
            })?;
            execution.merge_output_files(event.output_files);

            let _ = events.send(ExecutionEvent::StepPublished {
                execution_id: execution.id,
                status,
                message,
                new_output_files,
            });
            if status.is_terminal() {
                let _ = events.send(ExecutionEvent::Completed {
                    execution_id: execution.id,
                    status,
                });
            }
        }
        None => {
            execution.merge_output_files(event.output_files);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
