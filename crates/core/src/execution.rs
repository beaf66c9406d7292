//! Execution record.
//!
//! One execution is one unit of work: its own input files, its append-only
//! step history, and the output files it produced. The record is created by
//! the submitting caller; during a run its `steps` and `output_files` are
//! mutated exclusively through the engine's step-publish protocol, and it
//! becomes read-only once a terminal step is recorded.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::Batch;
use crate::error::CoreError;
use crate::file::{InputFile, OutputFile};
use crate::process::Process;
use crate::step::{ExecutionStatus, Step};
use crate::types::{BatchId, ExecutionId, ProcessId, Timestamp};

/// One unit of processing work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    /// Correlation identifier assigned by the submitting caller.
    pub correlation_id: String,
    pub batch_id: BatchId,
    pub batch_correlation_id: String,
    /// Wall-clock budget for the whole run (download, process, storage).
    pub timeout: Duration,
    pub input_files: Vec<InputFile>,
    /// Append-only step history; a valid path through the state machine.
    pub steps: Vec<Step>,
    /// Output files accumulated during the run, already published to
    /// shared storage.
    pub output_files: Vec<OutputFile>,
    pub tenant: String,
    pub user_email: String,
    pub process_id: ProcessId,
    pub process_name: String,
    pub submission_date: Timestamp,
    /// Set when the first `Running` step is recorded.
    pub start_date: Option<Timestamp>,
    /// Number of times the submitting caller has resubmitted this work.
    pub retry_count: u32,
    /// Whether the submitting caller intends to persist this execution.
    pub persist: bool,
}

impl Execution {
    /// Assemble a fresh execution for one fan-out unit of `batch`.
    pub fn new(
        correlation_id: impl Into<String>,
        batch: &Batch,
        process: &Process,
        timeout: Duration,
        input_files: Vec<InputFile>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            correlation_id: correlation_id.into(),
            batch_id: batch.id,
            batch_correlation_id: batch.correlation_id.clone(),
            timeout,
            input_files,
            steps: Vec::new(),
            output_files: Vec::new(),
            tenant: batch.tenant.clone(),
            user_email: batch.user.clone(),
            process_id: process.id,
            process_name: process.name.clone(),
            submission_date: chrono::Utc::now(),
            start_date: None,
            retry_count: 0,
            persist: batch.persist,
        }
    }

    /// Status of the most recently recorded step, if any.
    pub fn current_status(&self) -> Option<ExecutionStatus> {
        self.steps.last().map(|s| s.status)
    }

    /// Whether a terminal step has been recorded.
    pub fn is_sealed(&self) -> bool {
        self.current_status().is_some_and(|s| s.is_terminal())
    }

    /// Total declared size of the input files, in bytes.
    pub fn total_input_bytes(&self) -> u64 {
        self.input_files.iter().map(|f| f.size).sum()
    }

    /// Append `step`, enforcing the state machine.
    ///
    /// Recording the first `Running` step also sets `start_date`.
    pub fn record_step(&mut self, step: Step) -> Result<(), CoreError> {
        match self.current_status() {
            None => {
                if step.status != ExecutionStatus::Prepare {
                    return Err(CoreError::InvalidStepTransition {
                        from: None,
                        to: step.status,
                    });
                }
            }
            Some(current) if current.is_terminal() => return Err(CoreError::SealedExecution),
            Some(current) => {
                if !current.can_transition_to(step.status) {
                    return Err(CoreError::InvalidStepTransition {
                        from: Some(current),
                        to: step.status,
                    });
                }
            }
        }
        if step.status == ExecutionStatus::Running && self.start_date.is_none() {
            self.start_date = Some(step.timestamp);
        }
        self.steps.push(step);
        Ok(())
    }

    /// Merge newly produced output files into the accumulated list.
    ///
    /// Callers must not merge outputs into a sealed execution; the
    /// step-publish protocol enforces that.
    pub fn merge_output_files(&mut self, files: Vec<OutputFile>) {
        self.output_files.extend(files);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
