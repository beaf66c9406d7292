//! Resolved process definition.
//!
//! A [`Process`] is built once by the submitting caller from a registered
//! plugin configuration plus access-rights metadata, and is immutable for
//! the lifetime of a run.

use serde::{Deserialize, Serialize};

use crate::forecast::{DurationForecast, SizeForecast};
use crate::policy::{Cardinality, Scope};
use crate::types::ProcessId;

/// The resolved, versioned definition of what operation to run and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    pub name: String,
    /// Name of the workload engine that runs this process; resolved through
    /// the engine registry by the submitting caller.
    pub engine_name: String,
    pub duration_forecast: DurationForecast,
    pub size_forecast: SizeForecast,
    pub cardinality: Cardinality,
    pub scope: Scope,
    /// Runner-specific configuration, interpreted by the executable built
    /// for this process (e.g. the shell runner's script path and env spec).
    pub plugin_config: serde_json::Value,
}

impl Process {
    /// Total expected output bytes for inputs of `total_input_bytes`.
    pub fn expected_output_bytes(&self, total_input_bytes: u64) -> u64 {
        self.size_forecast.expected_bytes(total_input_bytes)
    }
}
