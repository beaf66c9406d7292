//! Batch submission record.
//!
//! A batch is one caller submission of parameter values against a process
//! definition. It is created once and shared read-only by every execution
//! fanned out from it.

use serde::{Deserialize, Serialize};

use crate::types::{BatchId, ProcessId};

/// One named parameter value supplied at submission time.
///
/// Parameter values are exported into the child process environment, after
/// the process definition's static variables, so a batch value overrides a
/// process default of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    pub value: String,
}

impl ParameterValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One caller submission against a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    /// Correlation identifier assigned by the submitting caller.
    pub correlation_id: String,
    pub process_id: ProcessId,
    pub tenant: String,
    pub user: String,
    pub role: String,
    pub parameter_values: Vec<ParameterValue>,
    /// Free-form metadata carried through from the submitting caller.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Whether the submitting caller intends to persist this batch.
    pub persist: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_round_trips_through_json() {
        let batch = Batch {
            id: uuid::Uuid::new_v4(),
            correlation_id: "corr".into(),
            process_id: uuid::Uuid::new_v4(),
            tenant: "tenant".into(),
            user: "user@ema.il".into(),
            role: "EXPLOIT".into(),
            parameter_values: vec![ParameterValue::new("GREETING", "hello")],
            metadata: serde_json::Map::new(),
            persist: true,
        };
        let json = serde_json::to_string(&batch).expect("serialize");
        let back: Batch = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, batch);
    }
}
