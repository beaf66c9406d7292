//! `pyxis-worker` library crate.
//!
//! Submission assembly for the worker binary: reads a JSON job
//! description, builds the process/batch/execution records, and fans the
//! batch out into executions according to the process's scope. Lives in a
//! library so the assembly logic is testable; the binary entrypoint is in
//! `main.rs`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use pyxis_core::batch::{Batch, ParameterValue};
use pyxis_core::execution::Execution;
use pyxis_core::file::InputFile;
use pyxis_core::forecast::{DurationForecast, SizeForecast};
use pyxis_core::policy::{Cardinality, Scope};
use pyxis_core::process::Process;

// ---------------------------------------------------------------------------
// Job description (input file format)
// ---------------------------------------------------------------------------

/// One job file: a process definition, submission identity, parameters and
/// the input file set.
#[derive(Debug, Deserialize)]
pub struct JobDescription {
    pub process: ProcessSpec,
    pub tenant: String,
    pub user: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub parameters: Vec<ParameterValue>,
    /// Per-execution timeout; falls back to the engine default when absent.
    pub timeout_secs: Option<u64>,
    pub input_files: Vec<InputFile>,
}

fn default_role() -> String {
    "USER".into()
}

/// Process definition as written in a job file.
#[derive(Debug, Deserialize)]
pub struct ProcessSpec {
    pub name: String,
    #[serde(default = "default_engine")]
    pub engine: String,
    pub script: String,
    pub env: Option<String>,
    pub cardinality: Cardinality,
    pub scope: Scope,
    #[serde(default = "default_duration_forecast")]
    pub duration_forecast: String,
    #[serde(default = "default_size_forecast")]
    pub size_forecast: String,
}

fn default_engine() -> String {
    pyxis_engine::engine::JOBS_ENGINE_NAME.into()
}

fn default_duration_forecast() -> String {
    "1h".into()
}

fn default_size_forecast() -> String {
    "*1".into()
}

// ---------------------------------------------------------------------------
// Submission assembly
// ---------------------------------------------------------------------------

/// Fully assembled submission: one batch fanned out into executions.
pub struct Submission {
    pub process: Arc<Process>,
    pub batch: Arc<Batch>,
    pub executions: Vec<Execution>,
}

/// Build the domain records for `job`.
///
/// The batch's input files are partitioned into executions according to
/// the process scope: one execution for the whole suborder, or one per
/// feature.
pub fn assemble(job: JobDescription, default_timeout: Duration) -> anyhow::Result<Submission> {
    let duration_forecast = DurationForecast::parse(&job.process.duration_forecast)
        .with_context(|| format!("process '{}'", job.process.name))?;
    let size_forecast = SizeForecast::parse(&job.process.size_forecast)
        .with_context(|| format!("process '{}'", job.process.name))?;

    let mut plugin_config = serde_json::json!({ "script": job.process.script });
    if let Some(env) = &job.process.env {
        plugin_config["env"] = serde_json::Value::String(env.clone());
    }

    let process = Arc::new(Process {
        id: uuid::Uuid::new_v4(),
        name: job.process.name,
        engine_name: job.process.engine,
        duration_forecast,
        size_forecast,
        cardinality: job.process.cardinality,
        scope: job.process.scope,
        plugin_config,
    });

    let batch = Arc::new(Batch {
        id: uuid::Uuid::new_v4(),
        correlation_id: format!("batch-{}", uuid::Uuid::new_v4()),
        process_id: process.id,
        tenant: job.tenant,
        user: job.user,
        role: job.role,
        parameter_values: job.parameters,
        metadata: serde_json::Map::new(),
        persist: false,
    });

    let timeout = job
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(default_timeout);

    let executions = process
        .scope
        .partition(job.input_files)
        .into_iter()
        .enumerate()
        .map(|(index, inputs)| {
            Execution::new(
                format!("{}-exec-{index}", batch.correlation_id),
                &batch,
                &process,
                timeout,
                inputs,
            )
        })
        .collect();

    Ok(Submission {
        process,
        batch,
        executions,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_json(scope: &str) -> serde_json::Value {
        json!({
            "process": {
                "name": "copy-transform",
                "script": "/opt/scripts/copy.sh",
                "env": "SIMPLE_FOO=foo",
                "cardinality": "ONE_PER_INPUT_FILE",
                "scope": scope,
                "duration_forecast": "10min",
                "size_forecast": "*1",
            },
            "tenant": "tenant",
            "user": "user@ema.il",
            "parameters": [{ "name": "GREETING", "value": "hello" }],
            "timeout_secs": 10,
            "input_files": [
                {
                    "name": "one",
                    "filename": "one.raw",
                    "mime_type": "text/plain",
                    "source_url": "file:///tmp/one.raw",
                    "size": 3,
                    "checksum": null,
                    "correlation_key": "feature-a",
                },
                {
                    "name": "two",
                    "filename": "two.raw",
                    "mime_type": "text/plain",
                    "source_url": "file:///tmp/two.raw",
                    "size": 3,
                    "checksum": null,
                    "correlation_key": "feature-b",
                },
            ],
        })
    }

    #[test]
    fn suborder_scope_assembles_one_execution() {
        let job: JobDescription = serde_json::from_value(job_json("SUBORDER")).expect("job");
        let submission = assemble(job, Duration::from_secs(3600)).expect("assemble");
        assert_eq!(submission.executions.len(), 1);
        assert_eq!(submission.executions[0].input_files.len(), 2);
        assert_eq!(submission.executions[0].timeout, Duration::from_secs(10));
        assert_eq!(submission.process.engine_name, "JOBS");
    }

    #[test]
    fn feature_scope_assembles_one_execution_per_feature() {
        let job: JobDescription = serde_json::from_value(job_json("FEATURE")).expect("job");
        let submission = assemble(job, Duration::from_secs(3600)).expect("assemble");
        assert_eq!(submission.executions.len(), 2);
        assert!(submission
            .executions
            .iter()
            .all(|e| e.input_files.len() == 1));
        // All executions share the one batch.
        assert!(submission
            .executions
            .iter()
            .all(|e| e.batch_id == submission.batch.id));
    }

    #[test]
    fn missing_timeout_uses_the_engine_default() {
        let mut value = job_json("SUBORDER");
        value.as_object_mut().expect("object").remove("timeout_secs");
        let job: JobDescription = serde_json::from_value(value).expect("job");
        let submission = assemble(job, Duration::from_secs(1234)).expect("assemble");
        assert_eq!(submission.executions[0].timeout, Duration::from_secs(1234));
    }

    #[test]
    fn unusable_forecast_is_rejected() {
        let mut value = job_json("SUBORDER");
        value["process"]["duration_forecast"] = json!("soonish");
        let job: JobDescription = serde_json::from_value(value).expect("job");
        assert!(assemble(job, Duration::from_secs(3600)).is_err());
    }
}
