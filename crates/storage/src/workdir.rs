//! Per-execution local workdir management.
//!
//! Every execution gets `<base>/<execution-id>/` with `input/` and
//! `output/` subdirectories. Directory names are derived from the execution
//! identifier, so concurrent executions can never collide and no locking is
//! needed between them. The engine releases the workdir on every exit path
//! (success, failure, timeout); release is idempotent so a cancelled run
//! can still be cleaned by id alone.

use std::path::{Path, PathBuf};

use pyxis_core::execution::Execution;
use pyxis_core::file::{is_safe_relative_filename, InputFile};
use pyxis_core::types::ExecutionId;

use crate::error::StorageError;
use crate::shared::LocalOutputFile;

/// Name of the subdirectory input files are downloaded into.
const INPUT_DIR: &str = "input";

/// Name of the subdirectory scanned for produced artifacts.
const OUTPUT_DIR: &str = "output";

// ---------------------------------------------------------------------------
// CleanupPolicy
// ---------------------------------------------------------------------------

/// What to do with a workdir once its run has terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Remove the workdir whatever the outcome.
    Always,
    /// Keep the workdir when the run failed, for debugging.
    KeepOnFailure,
}

// ---------------------------------------------------------------------------
// ExecutionWorkdir
// ---------------------------------------------------------------------------

/// Handle on one execution's isolated directory.
///
/// The handle does not remove anything on drop; cleanup belongs to
/// [`WorkdirManager::release`], which the engine calls unconditionally.
#[derive(Debug, Clone)]
pub struct ExecutionWorkdir {
    execution_id: ExecutionId,
    root: PathBuf,
}

impl ExecutionWorkdir {
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join(INPUT_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Destination path for one input file, under `input/`.
    ///
    /// Rejects descriptors whose filename would escape the workdir.
    pub fn input_path_for(&self, file: &InputFile) -> Result<PathBuf, StorageError> {
        if !is_safe_relative_filename(&file.filename) {
            return Err(StorageError::UnsafeFilename {
                filename: file.filename.clone(),
            });
        }
        Ok(self.input_dir().join(&file.filename))
    }

    /// Scan `output/` recursively for produced artifacts.
    ///
    /// Artifact names are paths relative to `output/`, so a script writing
    /// `output/sub/result.dat` yields the name `sub/result.dat`.
    pub async fn collect_outputs(&self) -> Result<Vec<LocalOutputFile>, StorageError> {
        let output_root = self.output_dir();
        let mut pending = vec![output_root.clone()];
        let mut outputs = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // The script may legitimately produce nothing at all.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let name = path
                        .strip_prefix(&output_root)
                        .map_err(|_| StorageError::Workdir {
                            path: path.clone(),
                            source: std::io::Error::other("output entry outside output root"),
                        })?
                        .to_string_lossy()
                        .into_owned();
                    let size = entry.metadata().await?.len();
                    outputs.push(LocalOutputFile { name, path, size });
                }
            }
        }

        // Deterministic order for callers and tests.
        outputs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(outputs)
    }
}

// ---------------------------------------------------------------------------
// WorkdirManager
// ---------------------------------------------------------------------------

/// Creates and tears down isolated directories, one per execution.
#[derive(Debug)]
pub struct WorkdirManager {
    base: PathBuf,
    policy: CleanupPolicy,
}

impl WorkdirManager {
    pub fn new(base: impl Into<PathBuf>, policy: CleanupPolicy) -> Self {
        Self {
            base: base.into(),
            policy,
        }
    }

    /// Directory assigned to `execution_id`, whether or not it exists yet.
    pub fn path_for(&self, execution_id: ExecutionId) -> PathBuf {
        self.base.join(execution_id.to_string())
    }

    /// Create the workdir for `execution` with its `input/` and `output/`
    /// subdirectories.
    pub async fn acquire(&self, execution: &Execution) -> Result<ExecutionWorkdir, StorageError> {
        let root = self.path_for(execution.id);
        for dir in [root.clone(), root.join(INPUT_DIR), root.join(OUTPUT_DIR)] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| StorageError::Workdir {
                    path: dir.clone(),
                    source,
                })?;
        }
        tracing::debug!(execution_id = %execution.id, workdir = %root.display(), "Workdir acquired");
        Ok(ExecutionWorkdir {
            execution_id: execution.id,
            root,
        })
    }

    /// Remove the workdir of `execution_id`, honouring the cleanup policy.
    ///
    /// Idempotent: a missing directory is not an error, so the engine can
    /// release unconditionally even after a cancelled acquisition.
    pub async fn release(
        &self,
        execution_id: ExecutionId,
        run_failed: bool,
    ) -> Result<(), StorageError> {
        if run_failed && self.policy == CleanupPolicy::KeepOnFailure {
            tracing::info!(
                execution_id = %execution_id,
                workdir = %self.path_for(execution_id).display(),
                "Keeping failed workdir for debugging",
            );
            return Ok(());
        }
        let root = self.path_for(execution_id);
        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => {
                tracing::debug!(execution_id = %execution_id, "Workdir released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Workdir { path: root, source }),
        }
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
    use pyxis_core::process::Process;
    use std::time::Duration;

    fn make_execution() -> Execution {
        let process = Process {
            id: uuid::Uuid::new_v4(),
            name: "copy".into(),
            engine_name: "JOBS".into(),
            duration_forecast: DurationForecast::parse("10min").expect("duration"),
            size_forecast: SizeForecast::parse("*1").expect("size"),
            cardinality: Cardinality::OnePerExecution,
            scope: Scope::Suborder,
            plugin_config: serde_json::Value::Null,
        };
        let batch = Batch {
            id: uuid::Uuid::new_v4(),
            correlation_id: "corr".into(),
            process_id: process.id,
            tenant: "tenant".into(),
            user: "user@ema.il".into(),
            role: "EXPLOIT".into(),
            parameter_values: vec![],
            metadata: serde_json::Map::new(),
            persist: false,
        };
        Execution::new("exec-corr", &batch, &process, Duration::from_secs(5), vec![])
    }

    fn input_file(filename: &str) -> InputFile {
        InputFile {
            name: "one".into(),
            filename: filename.into(),
            mime_type: "text/plain".into(),
            source_url: "file:///tmp/one.raw".into(),
            size: 3,
            checksum: None,
            metadata: serde_json::Map::new(),
            correlation_key: "one".into(),
        }
    }

    #[tokio::test]
    async fn acquire_creates_input_and_output_dirs() {
        let base = tempfile::tempdir().expect("tempdir");
        let manager = WorkdirManager::new(base.path(), CleanupPolicy::Always);
        let exec = make_execution();

        let workdir = manager.acquire(&exec).await.expect("acquire");
        assert!(workdir.input_dir().is_dir());
        assert!(workdir.output_dir().is_dir());
        assert!(workdir.root().starts_with(base.path()));
        assert!(workdir.root().ends_with(exec.id.to_string()));
    }

    #[tokio::test]
    async fn workdirs_are_disjoint_per_execution() {
        let base = tempfile::tempdir().expect("tempdir");
        let manager = WorkdirManager::new(base.path(), CleanupPolicy::Always);
        let a = manager.acquire(&make_execution()).await.expect("acquire a");
        let b = manager.acquire(&make_execution()).await.expect("acquire b");
        assert_ne!(a.root(), b.root());
    }

    #[tokio::test]
    async fn release_removes_the_tree_and_is_idempotent() {
        let base = tempfile::tempdir().expect("tempdir");
        let manager = WorkdirManager::new(base.path(), CleanupPolicy::Always);
        let exec = make_execution();
        let workdir = manager.acquire(&exec).await.expect("acquire");
        tokio::fs::write(workdir.output_dir().join("result.dat"), b"x")
            .await
            .expect("write");

        manager.release(exec.id, false).await.expect("release");
        assert!(!workdir.root().exists());
        // Second release of the same id is a no-op.
        manager.release(exec.id, false).await.expect("re-release");
    }

    #[tokio::test]
    async fn keep_on_failure_policy_retains_failed_workdirs() {
        let base = tempfile::tempdir().expect("tempdir");
        let manager = WorkdirManager::new(base.path(), CleanupPolicy::KeepOnFailure);
        let exec = make_execution();
        let workdir = manager.acquire(&exec).await.expect("acquire");

        manager.release(exec.id, true).await.expect("release failed run");
        assert!(workdir.root().exists());
        manager.release(exec.id, false).await.expect("release ok run");
        assert!(!workdir.root().exists());
    }

    #[tokio::test]
    async fn input_path_for_rejects_traversal() {
        let base = tempfile::tempdir().expect("tempdir");
        let manager = WorkdirManager::new(base.path(), CleanupPolicy::Always);
        let workdir = manager.acquire(&make_execution()).await.expect("acquire");

        let err = workdir.input_path_for(&input_file("../escape.raw")).unwrap_err();
        assert!(matches!(err, StorageError::UnsafeFilename { .. }));

        let ok = workdir.input_path_for(&input_file("one.raw")).expect("safe");
        assert!(ok.starts_with(workdir.input_dir()));
    }

    #[tokio::test]
    async fn collect_outputs_walks_nested_dirs() {
        let base = tempfile::tempdir().expect("tempdir");
        let manager = WorkdirManager::new(base.path(), CleanupPolicy::Always);
        let workdir = manager.acquire(&make_execution()).await.expect("acquire");

        tokio::fs::write(workdir.output_dir().join("b.dat"), b"bb")
            .await
            .expect("write b");
        tokio::fs::create_dir_all(workdir.output_dir().join("sub"))
            .await
            .expect("mkdir sub");
        tokio::fs::write(workdir.output_dir().join("sub/a.dat"), b"a")
            .await
            .expect("write a");

        let outputs = workdir.collect_outputs().await.expect("collect");
        let names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["b.dat", "sub/a.dat"]);
        assert_eq!(outputs[0].size, 2);
        assert_eq!(outputs[1].size, 1);
    }

    #[tokio::test]
    async fn collect_outputs_of_missing_dir_is_empty() {
        let base = tempfile::tempdir().expect("tempdir");
        let manager = WorkdirManager::new(base.path(), CleanupPolicy::Always);
        let exec = make_execution();
        let workdir = manager.acquire(&exec).await.expect("acquire");
        tokio::fs::remove_dir_all(workdir.output_dir()).await.expect("rm");

        let outputs = workdir.collect_outputs().await.expect("collect");
        assert!(outputs.is_empty());
    }
}
