//! Execution context: the single channel through which a running
//! executable reports progress.
//!
//! A context binds one execution to its batch and process definitions and
//! to the step-publish actor. The executable only ever borrows the
//! context; the engine consumes it at the end of the run to obtain the
//! final sealed execution.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use pyxis_core::batch::Batch;
use pyxis_core::execution::Execution;
use pyxis_core::file::OutputFile;
use pyxis_core::process::Process;
use pyxis_core::step::Step;

use crate::error::EngineError;
use crate::events::ExecutionEvent;
use crate::publisher::{ExecutionUpdater, PublishError, StepEvent};

/// Binding of one execution, its batch and process, and the step-publish
/// protocol.
pub struct ExecutionContext {
    /// Snapshot of the execution as submitted; the live state is owned by
    /// the publish actor.
    execution: Execution,
    batch: Arc<Batch>,
    process: Arc<Process>,
    updater: ExecutionUpdater,
    join: JoinHandle<Execution>,
}

impl ExecutionContext {
    /// Build a context for `execution`, spawning its step-publish actor.
    pub fn new(execution: Execution, batch: Arc<Batch>, process: Arc<Process>) -> Self {
        let (updater, join) = ExecutionUpdater::spawn(execution.clone());
        Self {
            execution,
            batch,
            process,
            updater,
            join,
        }
    }

    /// The execution as it was submitted (before any step was published).
    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn process(&self) -> &Process {
        &self.process
    }

    /// Publish one step event; resolves once the event is reflected in the
    /// accumulated state, returning the updated execution.
    pub async fn publish(&self, event: StepEvent) -> Result<Execution, PublishError> {
        self.updater.publish(event).await
    }

    /// Publish a bare step.
    pub async fn publish_step(&self, step: Step) -> Result<Execution, PublishError> {
        self.publish(StepEvent::step(step)).await
    }

    /// Publish a step together with newly produced output files; both are
    /// applied atomically.
    pub async fn publish_step_with_outputs(
        &self,
        step: Step,
        output_files: Vec<OutputFile>,
    ) -> Result<Execution, PublishError> {
        self.publish(StepEvent::step_with_outputs(step, output_files)).await
    }

    /// Current accumulated execution state.
    pub async fn snapshot(&self) -> Result<Execution, PublishError> {
        self.updater.snapshot().await
    }

    /// Subscribe to the execution's lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.updater.subscribe()
    }

    /// Consume the context and return the final execution record.
    ///
    /// Dropping the last updater handle ends the publish actor; whatever it
    /// accumulated is the run's result.
    pub async fn into_final(self) -> Result<Execution, EngineError> {
        let Self { updater, join, .. } = self;
        drop(updater);
        join.await
            .map_err(|e| EngineError::Internal(format!("execution updater task failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
