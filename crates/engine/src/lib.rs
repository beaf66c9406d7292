//! `pyxis-engine` library crate.
//!
//! The execution engine proper: the execution context and its step-publish
//! protocol, the executable abstraction with the shell process runner, and
//! the workload engine registry. The submitting caller assembles the domain
//! records from `pyxis-core`, builds an [`context::ExecutionContext`],
//! resolves an engine through [`registry::EngineRegistry`] and awaits
//! [`engine::WorkloadEngine::run`].

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod executable;
pub mod process;
pub mod publisher;
pub mod registry;
