//! Cardinality and scope policies, and the invocation plan derived from
//! them.
//!
//! Both policies are read from the process definition. Scope governs how a
//! batch is fanned out into executions upstream of the engine; cardinality
//! governs how one execution's input files map to process invocations. The
//! policy is interpreted exactly once, when an execution is paired with its
//! executable, into an [`InvocationPlan`] — call sites work from the plan
//! and never re-inspect the enums.

use serde::{Deserialize, Serialize};

use crate::file::InputFile;

// ---------------------------------------------------------------------------
// Cardinality
// ---------------------------------------------------------------------------

/// How many process invocations one execution's input files produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    /// One invocation per input file; results are aggregated back into the
    /// single execution.
    OnePerInputFile,
    /// One invocation per feature, i.e. per group of input files sharing a
    /// correlation key.
    OnePerFeature,
    /// A single invocation consuming all input files and producing a
    /// combined result (e.g. an archive).
    OnePerExecution,
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Whether cardinality fan-out is evaluated per execution or across the
/// whole suborder.
///
/// Scope is interpreted by the submitting caller when it splits a batch
/// into executions; it does not change how a single execution behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    /// One execution for the whole suborder; the script sees every feature.
    Suborder,
    /// One execution per feature, isolating each feature in its own
    /// execution context.
    Feature,
}

impl Scope {
    /// Partition a batch's input files into per-execution sets.
    ///
    /// `Suborder` yields a single set; `Feature` yields one set per
    /// distinct correlation key, in first-seen order.
    pub fn partition(self, files: Vec<InputFile>) -> Vec<Vec<InputFile>> {
        match self {
            Self::Suborder => {
                if files.is_empty() {
                    Vec::new()
                } else {
                    vec![files]
                }
            }
            Self::Feature => group_by_correlation_key(files),
        }
    }
}

// ---------------------------------------------------------------------------
// InvocationPlan
// ---------------------------------------------------------------------------

/// One planned process invocation and the input files it consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedInvocation {
    /// Position of this invocation within the plan, starting at 0.
    pub index: usize,
    pub input_files: Vec<InputFile>,
}

/// The concrete list of invocations derived from a cardinality policy and
/// an execution's input files.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationPlan {
    cardinality: Cardinality,
    invocations: Vec<PlannedInvocation>,
}

impl InvocationPlan {
    /// Interpret `cardinality` against `input_files` once.
    pub fn build(cardinality: Cardinality, input_files: &[InputFile]) -> Self {
        let groups: Vec<Vec<InputFile>> = match cardinality {
            Cardinality::OnePerInputFile => {
                input_files.iter().cloned().map(|f| vec![f]).collect()
            }
            Cardinality::OnePerFeature => group_by_correlation_key(input_files.to_vec()),
            Cardinality::OnePerExecution => {
                if input_files.is_empty() {
                    Vec::new()
                } else {
                    vec![input_files.to_vec()]
                }
            }
        };
        let invocations = groups
            .into_iter()
            .enumerate()
            .map(|(index, input_files)| PlannedInvocation { index, input_files })
            .collect();
        Self {
            cardinality,
            invocations,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn invocations(&self) -> &[PlannedInvocation] {
        &self.invocations
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }
}

/// Group files by correlation key, preserving first-seen key order.
fn group_by_correlation_key(files: Vec<InputFile>) -> Vec<Vec<InputFile>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<InputFile>> =
        std::collections::HashMap::new();
    for file in files {
        if !groups.contains_key(&file.correlation_key) {
            order.push(file.correlation_key.clone());
        }
        groups.entry(file.correlation_key.clone()).or_default().push(file);
    }
    order
        .into_iter()
        .map(|key| groups.remove(&key).unwrap_or_default())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
