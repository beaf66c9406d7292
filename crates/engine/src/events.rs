//! Execution lifecycle events.
//!
//! Every accepted step publication is mirrored onto a broadcast channel so
//! observers (monitoring, tests) can follow a run without touching the
//! execution record. Lagging or absent subscribers never affect the run.

use pyxis_core::step::ExecutionStatus;
use pyxis_core::types::ExecutionId;

/// Broadcast channel capacity for execution events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One observable lifecycle event of a running execution.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// A step was appended to the execution's history.
    StepPublished {
        execution_id: ExecutionId,
        status: ExecutionStatus,
        message: Option<String>,
        /// Number of output files merged together with this step.
        new_output_files: usize,
    },
    /// A terminal step sealed the execution.
    Completed {
        execution_id: ExecutionId,
        status: ExecutionStatus,
    },
}
