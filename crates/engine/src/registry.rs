//! Workload engine registry.
//!
//! Engines register under their name; the submitting caller resolves the
//! name carried by a process definition to a concrete backend before
//! delegating to it. An unresolved name is a configuration error returned
//! to the submitter; the registry never retries anything itself.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::engine::WorkloadEngine;
use crate::error::EngineError;

/// Registry of named execution backends. Read-mostly after startup.
#[derive(Default)]
pub struct EngineRegistry {
    engines: RwLock<HashMap<String, Arc<dyn WorkloadEngine>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `engine` under its own name, replacing any previous
    /// registration of that name.
    pub async fn register(&self, engine: Arc<dyn WorkloadEngine>) {
        let name = engine.name().to_string();
        let previous = self.engines.write().await.insert(name.clone(), engine);
        if previous.is_some() {
            tracing::warn!(engine = %name, "Replaced previously registered workload engine");
        } else {
            tracing::info!(engine = %name, "Workload engine registered");
        }
    }

    /// Look up an engine by name.
    pub async fn find_by_name(&self, name: &str) -> Option<Arc<dyn WorkloadEngine>> {
        self.engines.read().await.get(name).cloned()
    }

    /// Look up an engine by name, treating absence as a configuration
    /// error for the submitter.
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn WorkloadEngine>, EngineError> {
        self.find_by_name(name)
            .await
            .ok_or_else(|| EngineError::UnknownEngine(name.to_string()))
    }

    /// Names of all registered engines, for diagnostics.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
