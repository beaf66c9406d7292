//! Shared storage publisher: durable persistence of produced files.
//!
//! After a process invocation succeeds, the files collected from the
//! workdir's `output/` directory are published to shared storage and the
//! execution's output list is rewritten in terms of externally resolvable
//! locations. Storage failure is reported distinctly from process failure
//! so operators can tell "rerun the script" from "retry the upload".

use std::path::PathBuf;

use async_trait::async_trait;

use pyxis_core::execution::Execution;
use pyxis_core::file::OutputFile;
use pyxis_core::hashing;

use crate::error::StorageError;

// ---------------------------------------------------------------------------
// LocalOutputFile
// ---------------------------------------------------------------------------

/// One artifact found in a workdir's output directory, before publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalOutputFile {
    /// Path relative to the execution's output root.
    pub name: String,
    /// Absolute path inside the workdir.
    pub path: PathBuf,
    pub size: u64,
}

// ---------------------------------------------------------------------------
// SharedStoragePublisher
// ---------------------------------------------------------------------------

/// Externally supplied persistence capability for result files.
#[async_trait]
pub trait SharedStoragePublisher: Send + Sync {
    /// Persist `files` durably for `execution`, returning descriptors whose
    /// `result_url` is externally resolvable (never a workdir path).
    async fn store_result(
        &self,
        execution: &Execution,
        files: Vec<LocalOutputFile>,
    ) -> Result<Vec<OutputFile>, StorageError>;
}

// ---------------------------------------------------------------------------
// LocalSharedStorage
// ---------------------------------------------------------------------------

/// Publisher backed by a shared filesystem mount.
///
/// Results land in `<base>/<execution-id>/<name>` and are addressed with
/// `file://` URLs. Checksums are computed from the stored copy, so the URL,
/// size and digest all describe the same durable bytes.
#[derive(Debug)]
pub struct LocalSharedStorage {
    base: PathBuf,
}

impl LocalSharedStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl SharedStoragePublisher for LocalSharedStorage {
    async fn store_result(
        &self,
        execution: &Execution,
        files: Vec<LocalOutputFile>,
    ) -> Result<Vec<OutputFile>, StorageError> {
        let target_root = self.base.join(execution.id.to_string());
        let mut stored = Vec::with_capacity(files.len());

        for file in files {
            let target = target_root.join(&file.name);

            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| store_error(&file.name, e))?;
            }
            tokio::fs::copy(&file.path, &target)
                .await
                .map_err(|e| store_error(&file.name, e))?;

            let bytes = tokio::fs::read(&target)
                .await
                .map_err(|e| store_error(&file.name, e))?;
            stored.push(OutputFile {
                name: file.name.clone(),
                result_url: format!("file://{}", target.display()),
                size: Some(bytes.len() as u64),
                checksum: Some(hashing::sha256_hex(&bytes)),
            });
            tracing::debug!(
                execution_id = %execution.id,
                file = %file.name,
                target = %target.display(),
                "Stored result file",
            );
        }

        Ok(stored)
    }
}

fn store_error(file: &str, source: std::io::Error) -> StorageError {
    StorageError::Store {
        file: file.to_string(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
