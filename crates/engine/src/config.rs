//! Engine configuration loaded from environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pyxis_storage::download::AutoDownloader;
use pyxis_storage::shared::LocalSharedStorage;
use pyxis_storage::workdir::{CleanupPolicy, WorkdirManager};

use crate::engine::EngineServices;

/// Engine configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base directory for per-execution workdirs (default: `var/workdirs`).
    pub workdir_base: PathBuf,
    /// Base directory of the shared result storage (default: `var/storage`).
    pub storage_base: PathBuf,
    /// Keep failed executions' workdirs for debugging (default: `false`).
    pub keep_failed_workdirs: bool,
    /// Timeout applied when a submission does not carry one (default: `3600`).
    pub default_timeout_secs: u64,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default        |
    /// |------------------------------|----------------|
    /// | `PYXIS_WORKDIR_BASE`         | `var/workdirs` |
    /// | `PYXIS_STORAGE_BASE`         | `var/storage`  |
    /// | `PYXIS_KEEP_FAILED_WORKDIRS` | `false`        |
    /// | `PYXIS_DEFAULT_TIMEOUT_SECS` | `3600`         |
    pub fn from_env() -> Self {
        let workdir_base = std::env::var("PYXIS_WORKDIR_BASE")
            .unwrap_or_else(|_| "var/workdirs".into())
            .into();

        let storage_base = std::env::var("PYXIS_STORAGE_BASE")
            .unwrap_or_else(|_| "var/storage".into())
            .into();

        let keep_failed_workdirs: bool = std::env::var("PYXIS_KEEP_FAILED_WORKDIRS")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("PYXIS_KEEP_FAILED_WORKDIRS must be true or false");

        let default_timeout_secs: u64 = std::env::var("PYXIS_DEFAULT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("PYXIS_DEFAULT_TIMEOUT_SECS must be a valid u64");

        Self {
            workdir_base,
            storage_base,
            keep_failed_workdirs,
            default_timeout_secs,
        }
    }

    /// Timeout applied when a submission does not carry one.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Assemble the engine services this configuration describes: local
    /// workdirs, scheme-dispatching downloads, filesystem-backed shared
    /// storage.
    pub fn build_services(&self) -> EngineServices {
        let policy = if self.keep_failed_workdirs {
            CleanupPolicy::KeepOnFailure
        } else {
            CleanupPolicy::Always
        };
        EngineServices {
            workdirs: Arc::new(WorkdirManager::new(self.workdir_base.clone(), policy)),
            downloads: Arc::new(AutoDownloader::new()),
            storage: Arc::new(LocalSharedStorage::new(self.storage_base.clone())),
        }
    }
}
