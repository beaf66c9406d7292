//! Worker binary: run one job file to completion and print the results.
//!
//! Usage: `pyxis-worker <job.json>`. Engine configuration comes from the
//! environment (see [`pyxis_engine::config::EngineConfig`]); the job file
//! format is defined in [`pyxis_worker::JobDescription`].

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyxis_engine::config::EngineConfig;
use pyxis_engine::context::ExecutionContext;
use pyxis_engine::engine::{JobEngine, WorkloadEngine};
use pyxis_engine::registry::EngineRegistry;

use pyxis_worker::{assemble, JobDescription};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pyxis_worker=debug,pyxis_engine=debug,pyxis_storage=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: pyxis-worker <job.json>")?;
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let job: JobDescription =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;

    let config = EngineConfig::from_env();
    let submission = assemble(job, config.default_timeout())?;

    let registry = EngineRegistry::new();
    registry
        .register(Arc::new(JobEngine::new(config.build_services())))
        .await;
    let engine = registry.resolve(&submission.process.engine_name).await?;

    tracing::info!(
        process = %submission.process.name,
        engine = %submission.process.engine_name,
        executions = submission.executions.len(),
        "Submitting job",
    );

    let runs = submission.executions.into_iter().map(|execution| {
        let ctx = ExecutionContext::new(
            execution,
            submission.batch.clone(),
            submission.process.clone(),
        );
        engine.run(ctx)
    });
    let executions = futures::future::join_all(runs)
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    println!("{}", serde_json::to_string_pretty(&executions)?);
    Ok(())
}
