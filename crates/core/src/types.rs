//! Shared type aliases used across the workspace.

/// Executions are keyed by UUID, assigned by the submitting caller.
pub type ExecutionId = uuid::Uuid;

/// Batches are keyed by UUID, assigned by the submitting caller.
pub type BatchId = uuid::Uuid;

/// Process definitions are keyed by UUID (the plugin configuration's
/// business identifier on the submitting side).
pub type ProcessId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
