//! Shared builders for the engine integration tests.
//!
//! Scripts are written at runtime into the test's tempdir; input files are
//! materialised on disk and referenced with `file://` URLs, so every test
//! runs hermetically against real subprocesses and a real filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use pyxis_core::batch::{Batch, ParameterValue};
use pyxis_core::execution::Execution;
use pyxis_core::file::InputFile;
use pyxis_core::forecast::{DurationForecast, SizeForecast};
use pyxis_core::hashing;
use pyxis_core::policy::{Cardinality, Scope};
use pyxis_core::process::Process;

use pyxis_storage::error::StorageError;
use pyxis_storage::shared::{LocalOutputFile, SharedStoragePublisher};

use pyxis_engine::config::EngineConfig;
use pyxis_engine::context::ExecutionContext;
use pyxis_engine::engine::EngineServices;

/// Write a bash script into `dir` and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/bash\nset -e\n{body}")).expect("write script");
    path
}

/// Materialise an input file on disk and build its descriptor.
pub fn make_input(dir: &Path, name: &str, contents: &[u8], correlation_key: &str) -> InputFile {
    let filename = format!("{name}.raw");
    let source = dir.join(&filename);
    std::fs::write(&source, contents).expect("write input source");
    InputFile {
        name: name.to_string(),
        filename,
        mime_type: "text/plain".into(),
        source_url: format!("file://{}", source.display()),
        size: contents.len() as u64,
        checksum: Some(hashing::sha256_hex(contents)),
        metadata: serde_json::Map::new(),
        correlation_key: correlation_key.to_string(),
    }
}

/// Build a shell process definition for `script`.
pub fn make_process(script: &Path, cardinality: Cardinality, env: Option<&str>) -> Arc<Process> {
    let mut plugin_config = serde_json::json!({
        "script": script.display().to_string(),
    });
    if let Some(env) = env {
        plugin_config["env"] = serde_json::Value::String(env.to_string());
    }
    Arc::new(Process {
        id: uuid::Uuid::new_v4(),
        name: "shell-transform".into(),
        engine_name: "JOBS".into(),
        duration_forecast: DurationForecast::parse("10min").expect("duration"),
        size_forecast: SizeForecast::parse("*1").expect("size"),
        cardinality,
        scope: Scope::Suborder,
        plugin_config,
    })
}

/// Build a batch for `process` with the given parameter values.
pub fn make_batch(process: &Process, parameters: Vec<ParameterValue>) -> Arc<Batch> {
    Arc::new(Batch {
        id: uuid::Uuid::new_v4(),
        correlation_id: "batch-corr".into(),
        process_id: process.id,
        tenant: "tenant".into(),
        user: "user@ema.il".into(),
        role: "EXPLOIT".into(),
        parameter_values: parameters,
        metadata: serde_json::Map::new(),
        persist: true,
    })
}

/// Build an execution context over fresh batch/execution records.
pub fn make_context(
    process: Arc<Process>,
    batch: Arc<Batch>,
    inputs: Vec<InputFile>,
    timeout: Duration,
) -> ExecutionContext {
    let execution = Execution::new("exec-corr", &batch, &process, timeout, inputs);
    ExecutionContext::new(execution, batch, process)
}

/// Engine services rooted in the test's tempdir.
pub fn make_services(base: &Path) -> EngineServices {
    let config = EngineConfig {
        workdir_base: base.join("workdirs"),
        storage_base: base.join("storage"),
        keep_failed_workdirs: false,
        default_timeout_secs: 60,
    };
    config.build_services()
}

/// A shared storage publisher that always fails, for storage-error paths.
pub struct FailingStorage;

#[async_trait]
impl SharedStoragePublisher for FailingStorage {
    async fn store_result(
        &self,
        _execution: &Execution,
        files: Vec<LocalOutputFile>,
    ) -> Result<Vec<pyxis_core::file::OutputFile>, StorageError> {
        Err(StorageError::Store {
            file: files
                .first()
                .map(|f| f.name.clone())
                .unwrap_or_else(|| "(none)".into()),
            source: std::io::Error::other("shared storage offline"),
        })
    }
}
