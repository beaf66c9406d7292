//! Workload engines.
//!
//! A workload engine is a named backend capable of running an execution
//! context to completion. [`JobEngine`] is the in-process backend: it
//! resolves the executable from the process definition, drives it under
//! the execution's timeout, and guarantees that every initiated execution
//! reaches exactly one terminal step and that its workdir is released on
//! every exit path.

use std::sync::Arc;

use async_trait::async_trait;

use pyxis_core::execution::Execution;
use pyxis_core::step::{ExecutionStatus, Step};

use pyxis_storage::download::DownloadService;
use pyxis_storage::shared::SharedStoragePublisher;
use pyxis_storage::workdir::WorkdirManager;

use crate::context::ExecutionContext;
use crate::error::{EngineError, ExecutableError, RunError};
use crate::executable::{Executable, ShellExecutable};
use crate::publisher::PublishError;

/// Name under which the in-process job engine registers itself.
pub const JOBS_ENGINE_NAME: &str = "JOBS";

// ---------------------------------------------------------------------------
// WorkloadEngine
// ---------------------------------------------------------------------------

/// A named execution backend.
#[async_trait]
pub trait WorkloadEngine: Send + Sync {
    /// Registry name of this backend.
    fn name(&self) -> &str;

    /// Run the context to completion and return the final execution.
    ///
    /// Completes normally for every handled failure (the execution carries
    /// the terminal `Failure` step); errs only for configuration problems
    /// detected before the run starts and for workdir exhaustion.
    async fn run(&self, ctx: ExecutionContext) -> Result<Execution, EngineError>;
}

// ---------------------------------------------------------------------------
// EngineServices
// ---------------------------------------------------------------------------

/// Shared infrastructure handed to executables.
#[derive(Clone)]
pub struct EngineServices {
    pub workdirs: Arc<WorkdirManager>,
    pub downloads: Arc<dyn DownloadService>,
    pub storage: Arc<dyn SharedStoragePublisher>,
}

// ---------------------------------------------------------------------------
// JobEngine
// ---------------------------------------------------------------------------

/// In-process workload engine for shell-script processes.
pub struct JobEngine {
    services: EngineServices,
}

impl JobEngine {
    pub fn new(services: EngineServices) -> Self {
        Self { services }
    }

    /// Drive `executable` against `ctx` under the execution's timeout.
    async fn drive(
        &self,
        ctx: ExecutionContext,
        executable: impl Executable,
    ) -> Result<Execution, EngineError> {
        let execution_id = ctx.execution().id;
        let deadline = ctx.execution().timeout;
        tracing::info!(
            execution_id = %execution_id,
            process = %ctx.process().name,
            timeout_ms = deadline.as_millis() as u64,
            "Execution starting",
        );

        let run_result = tokio::time::timeout(deadline, executable.execute(&ctx)).await;

        let fatal = match run_result {
            Ok(Ok(())) => None,
            Ok(Err(ExecutableError::Run(e))) => {
                tracing::warn!(execution_id = %execution_id, error = %e, "Execution failed");
                publish_failure(&ctx, &e.to_string()).await;
                None
            }
            Ok(Err(ExecutableError::WorkdirUnavailable(message))) => {
                // The one condition allowed to fault the result channel.
                tracing::error!(execution_id = %execution_id, error = %message, "Workdir unavailable");
                Some(EngineError::WorkdirUnavailable(message))
            }
            Err(_elapsed) => {
                // The executable's future was cancelled; `kill_on_drop`
                // took the child process down with it.
                tracing::warn!(
                    execution_id = %execution_id,
                    timeout_ms = deadline.as_millis() as u64,
                    "Execution timed out",
                );
                let timeout_error =
                    RunError::timeout(format!("timed out after {} ms", deadline.as_millis()));
                publish_failure(&ctx, &timeout_error.to_string()).await;
                None
            }
        };

        // An executable that returns Ok without sealing the execution is a
        // bug; close the sequence so no run ends without a terminal step.
        if fatal.is_none() {
            if let Ok(snapshot) = ctx.snapshot().await {
                if !snapshot.is_sealed() {
                    let internal =
                        RunError::internal("executable finished without a terminal step");
                    publish_failure(&ctx, &internal.to_string()).await;
                }
            }
        }

        let final_execution = ctx.into_final().await;

        // Workdir release on every exit path: success, failure, timeout,
        // and even the fatal case.
        let run_failed = final_execution
            .as_ref()
            .map(|e| e.current_status() != Some(ExecutionStatus::Success))
            .unwrap_or(true);
        if let Err(e) = self.services.workdirs.release(execution_id, run_failed).await {
            tracing::warn!(execution_id = %execution_id, error = %e, "Failed to release workdir");
        }

        if let Some(error) = fatal {
            return Err(error);
        }
        let final_execution = final_execution?;
        tracing::info!(
            execution_id = %execution_id,
            status = ?final_execution.current_status(),
            output_files = final_execution.output_files.len(),
            "Execution finished",
        );
        Ok(final_execution)
    }
}

#[async_trait]
impl WorkloadEngine for JobEngine {
    fn name(&self) -> &str {
        JOBS_ENGINE_NAME
    }

    async fn run(&self, ctx: ExecutionContext) -> Result<Execution, EngineError> {
        // Configuration problems surface here, before any step is
        // published.
        let executable = ShellExecutable::from_process(
            ctx.process(),
            self.services.workdirs.clone(),
            self.services.downloads.clone(),
            self.services.storage.clone(),
        )?;
        self.drive(ctx, executable).await
    }
}

/// Publish a terminal `Failure` step, tolerating the races a cancelled run
/// can produce.
async fn publish_failure(ctx: &ExecutionContext, message: &str) {
    // A run aborted before its first publish has an empty sequence, which
    // only accepts Prepare; open it so the failure can seal it.
    if let Ok(snapshot) = ctx.snapshot().await {
        if snapshot.steps.is_empty() {
            let _ = ctx
                .publish_step(Step::prepare("Execution aborted before preparation"))
                .await;
        }
    }
    match ctx.publish_step(Step::failure(message)).await {
        Ok(_) => {}
        Err(PublishError::Sealed) => {
            // The executable sealed the execution in the same instant the
            // timeout fired; the recorded terminal step wins.
            tracing::debug!("Failure step skipped: execution already sealed");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to publish failure step");
        }
    }
}
