//! Executable abstraction and the shell process runner.
//!
//! An [`Executable`] is a single-use asynchronous unit of work driven
//! against an execution context. [`ShellExecutable`] is the concrete
//! runner for shell-script processes: it prepares a workdir, downloads the
//! inputs, invokes the script per the process's cardinality policy,
//! collects produced artifacts and publishes them through the shared
//! storage publisher.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use pyxis_core::env_vars::parse_env_spec;
use pyxis_core::policy::{InvocationPlan, PlannedInvocation};
use pyxis_core::process::Process;
use pyxis_core::step::Step;

use pyxis_storage::download::{self, DownloadService};
use pyxis_storage::shared::SharedStoragePublisher;
use pyxis_storage::workdir::{ExecutionWorkdir, WorkdirManager};

use crate::context::ExecutionContext;
use crate::error::{EngineError, ExecutableError, RunError};
use crate::process::{run_command, CommandSpec};

/// Cap on the stderr excerpt embedded in a failure step message.
const STDERR_EXCERPT_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Executable
// ---------------------------------------------------------------------------

/// One asynchronous unit of processing work.
///
/// Single-use: once `execute` has been started for a context it must not
/// be started again. A `Run` error is a handled failure that the engine
/// turns into the terminal `Failure` step; only workdir exhaustion may
/// escape as a fault.
#[async_trait]
pub trait Executable: Send + Sync {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), ExecutableError>;
}

// ---------------------------------------------------------------------------
// ShellExecutable
// ---------------------------------------------------------------------------

/// Plugin configuration understood by the shell runner.
#[derive(Debug, Deserialize)]
struct ShellPluginConfig {
    /// Script name or absolute path; must be executable and reachable.
    script: String,
    /// Static environment variables, formatted `KEY1=value1&KEY2=value2`.
    #[serde(default)]
    env: Option<String>,
}

/// Shell-script process runner.
pub struct ShellExecutable {
    script: PathBuf,
    static_env: Vec<(String, String)>,
    workdirs: Arc<WorkdirManager>,
    downloads: Arc<dyn DownloadService>,
    storage: Arc<dyn SharedStoragePublisher>,
}

impl ShellExecutable {
    /// Build the runner from a process definition.
    ///
    /// Invalid plugin configuration is a configuration error, surfaced to
    /// the submitter before any step is published.
    pub fn from_process(
        process: &Process,
        workdirs: Arc<WorkdirManager>,
        downloads: Arc<dyn DownloadService>,
        storage: Arc<dyn SharedStoragePublisher>,
    ) -> Result<Self, EngineError> {
        let config: ShellPluginConfig = serde_json::from_value(process.plugin_config.clone())
            .map_err(|e| {
                EngineError::Configuration(format!(
                    "invalid shell plugin config for process '{}': {e}",
                    process.name
                ))
            })?;
        if config.script.trim().is_empty() {
            return Err(EngineError::Configuration(format!(
                "process '{}' declares an empty script path",
                process.name
            )));
        }
        let static_env = match config.env.as_deref() {
            Some(spec) => parse_env_spec(spec)
                .map_err(|e| EngineError::Configuration(e.to_string()))?,
            None => Vec::new(),
        };
        Ok(Self {
            script: PathBuf::from(config.script.trim()),
            static_env,
            workdirs,
            downloads,
            storage,
        })
    }

    /// Environment for one planned invocation: static process variables,
    /// then batch parameter values (overriding process defaults of the
    /// same name), then the standard `PYXIS_*` variables.
    fn build_env(
        &self,
        ctx: &ExecutionContext,
        workdir: &ExecutionWorkdir,
        invocation: &PlannedInvocation,
    ) -> Vec<(String, String)> {
        let mut env = self.static_env.clone();
        for parameter in &ctx.batch().parameter_values {
            env.push((parameter.name.clone(), parameter.value.clone()));
        }

        let input_paths: Vec<String> = invocation
            .input_files
            .iter()
            .map(|f| format!("input/{}", f.filename))
            .collect();
        env.push(("PYXIS_WORKDIR".into(), workdir.root().display().to_string()));
        env.push(("PYXIS_INPUT_DIR".into(), workdir.input_dir().display().to_string()));
        env.push(("PYXIS_OUTPUT_DIR".into(), workdir.output_dir().display().to_string()));
        env.push(("PYXIS_EXECUTION_ID".into(), ctx.execution().id.to_string()));
        env.push(("PYXIS_TENANT".into(), ctx.execution().tenant.clone()));
        env.push(("PYXIS_INVOCATION_INDEX".into(), invocation.index.to_string()));
        env.push(("PYXIS_INPUT_FILES".into(), input_paths.join(" ")));
        if let [single] = input_paths.as_slice() {
            env.push(("PYXIS_INPUT_FILE".into(), single.clone()));
        }
        env
    }

    async fn run_invocation(
        &self,
        ctx: &ExecutionContext,
        workdir: &ExecutionWorkdir,
        invocation: &PlannedInvocation,
    ) -> Result<(), RunError> {
        let spec = CommandSpec {
            program: "bash".into(),
            args: vec![self.script.to_string_lossy().into_owned()],
            env: self.build_env(ctx, workdir, invocation),
            cwd: workdir.root().to_path_buf(),
        };

        let outcome = run_command(&spec).await?;
        if !outcome.stdout.trim().is_empty() {
            tracing::debug!(
                execution_id = %ctx.execution().id,
                batch_id = %ctx.batch().id,
                invocation = invocation.index,
                stdout = %outcome.stdout.trim(),
                "Script stdout",
            );
        }
        if !outcome.stderr.trim().is_empty() {
            tracing::warn!(
                execution_id = %ctx.execution().id,
                batch_id = %ctx.batch().id,
                invocation = invocation.index,
                stderr = %outcome.stderr.trim(),
                "Script stderr",
            );
        }

        if !outcome.succeeded() {
            return Err(RunError::process(format!(
                "script '{}' exited with status {}: {}",
                self.script.display(),
                outcome.exit_code,
                stderr_excerpt(&outcome.stderr),
            )));
        }
        tracing::info!(
            execution_id = %ctx.execution().id,
            invocation = invocation.index,
            duration_ms = outcome.duration.as_millis() as u64,
            "Script invocation exited with status 0",
        );
        Ok(())
    }
}

#[async_trait]
impl Executable for ShellExecutable {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), ExecutableError> {
        let execution = ctx.execution();

        ctx.publish_step(Step::prepare(format!(
            "Load input files into workdir | execId={}",
            execution.id
        )))
        .await
        .map_err(RunError::from)?;

        // Workdir acquisition failure is the one fault allowed to escape.
        let workdir = self.workdirs.acquire(execution).await?;

        for file in &execution.input_files {
            let dest = workdir.input_path_for(file)?;
            download::fetch_input(self.downloads.as_ref(), file, &dest).await?;
            tracing::debug!(
                execution_id = %execution.id,
                file = %file.name,
                dest = %dest.display(),
                "Input file downloaded",
            );
        }

        // The cardinality policy is interpreted exactly once.
        let plan = InvocationPlan::build(ctx.process().cardinality, &execution.input_files);

        ctx.publish_step(Step::running(format!(
            "Launch script {} | execId={}",
            self.script.display(),
            execution.id
        )))
        .await
        .map_err(RunError::from)?;

        for invocation in plan.invocations() {
            self.run_invocation(ctx, &workdir, invocation).await?;
        }

        let produced = workdir
            .collect_outputs()
            .await
            .map_err(|e| RunError::internal(format!("failed to scan output dir: {e}")))?;

        let stored = self
            .storage
            .store_result(execution, produced)
            .await
            .map_err(|e| RunError::store(e.to_string()))?;

        ctx.publish_step_with_outputs(
            Step::success(format!("Stored {} output files", stored.len())),
            stored,
        )
        .await
        .map_err(RunError::from)?;

        Ok(())
    }
}

/// Bounded tail of a stderr capture for inclusion in a failure message.
fn stderr_excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "(no stderr)".into();
    }
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= STDERR_EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        chars[chars.len() - STDERR_EXCERPT_CHARS..].iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pyxis_core::batch::Batch;
    use pyxis_core::forecast::{DurationForecast, SizeForecast};
    use pyxis_core::policy::{Cardinality, Scope};
    use pyxis_storage::download::AutoDownloader;
    use pyxis_storage::shared::LocalSharedStorage;
    use pyxis_storage::workdir::CleanupPolicy;
    use serde_json::json;

    fn make_process(plugin_config: serde_json::Value) -> Process {
        Process {
            id: uuid::Uuid::new_v4(),
            name: "copy".into(),
            engine_name: "JOBS".into(),
            duration_forecast: DurationForecast::parse("10min").expect("duration"),
            size_forecast: SizeForecast::parse("*1").expect("size"),
            cardinality: Cardinality::OnePerInputFile,
            scope: Scope::Suborder,
            plugin_config,
        }
    }

    fn make_services(
        base: &std::path::Path,
    ) -> (
        Arc<WorkdirManager>,
        Arc<dyn DownloadService>,
        Arc<dyn SharedStoragePublisher>,
    ) {
        (
            Arc::new(WorkdirManager::new(base.join("workdirs"), CleanupPolicy::Always)),
            Arc::new(AutoDownloader::new()),
            Arc::new(LocalSharedStorage::new(base.join("storage"))),
        )
    }

    #[test]
    fn from_process_parses_script_and_env() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (workdirs, downloads, storage) = make_services(dir.path());
        let process = make_process(json!({
            "script": "/opt/scripts/copy.sh",
            "env": "SIMPLE_FOO=foo&SIMPLE_BAR=bar",
        }));
        let exe = ShellExecutable::from_process(&process, workdirs, downloads, storage)
            .expect("build");
        assert_eq!(exe.script, PathBuf::from("/opt/scripts/copy.sh"));
        assert_eq!(exe.static_env.len(), 2);
    }

    #[test]
    fn from_process_rejects_missing_script() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (workdirs, downloads, storage) = make_services(dir.path());
        let process = make_process(json!({ "env": "A=1" }));
        let err = match ShellExecutable::from_process(&process, workdirs, downloads, storage) {
            Ok(_) => panic!("expected from_process to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn from_process_rejects_bad_env_spec() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (workdirs, downloads, storage) = make_services(dir.path());
        let process = make_process(json!({
            "script": "/opt/scripts/copy.sh",
            "env": "nonsense-without-equals",
        }));
        let err = match ShellExecutable::from_process(&process, workdirs, downloads, storage) {
            Ok(_) => panic!("expected from_process to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn batch_parameters_override_static_env() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (workdirs, downloads, storage) = make_services(dir.path());
        let process = Arc::new(make_process(json!({
            "script": "/opt/scripts/copy.sh",
            "env": "GREETING=default",
        })));
        let batch = Arc::new(Batch {
            id: uuid::Uuid::new_v4(),
            correlation_id: "corr".into(),
            process_id: process.id,
            tenant: "tenant".into(),
            user: "user@ema.il".into(),
            role: "EXPLOIT".into(),
            parameter_values: vec![pyxis_core::batch::ParameterValue::new(
                "GREETING", "overridden",
            )],
            metadata: serde_json::Map::new(),
            persist: false,
        });
        let execution = pyxis_core::execution::Execution::new(
            "exec-corr",
            &batch,
            &process,
            std::time::Duration::from_secs(5),
            vec![],
        );
        let exe = ShellExecutable::from_process(
            &process,
            workdirs.clone(),
            downloads,
            storage,
        )
        .expect("build");
        let ctx = ExecutionContext::new(execution, batch, process);

        let manager = WorkdirManager::new(dir.path().join("env-test"), CleanupPolicy::Always);
        let workdir = manager.acquire(ctx.execution()).await.expect("acquire");
        let invocation = PlannedInvocation {
            index: 0,
            input_files: vec![],
        };
        let env = exe.build_env(&ctx, &workdir, &invocation);

        // Later entries win when the child applies them in order.
        let greeting_values: Vec<&str> = env
            .iter()
            .filter(|(k, _)| k == "GREETING")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(greeting_values, vec!["default", "overridden"]);
        assert!(env.iter().any(|(k, _)| k == "PYXIS_OUTPUT_DIR"));
        assert!(env.iter().any(|(k, v)| k == "PYXIS_INVOCATION_INDEX" && v == "0"));
    }

    #[test]
    fn stderr_excerpt_bounds_long_output() {
        let long = "x".repeat(2000);
        let excerpt = stderr_excerpt(&long);
        assert_eq!(excerpt.chars().count(), STDERR_EXCERPT_CHARS);
        assert_eq!(stderr_excerpt("   "), "(no stderr)");
    }
}
