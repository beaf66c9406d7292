//! `pyxis-storage` library crate.
//!
//! Filesystem and transfer concerns of the engine: the per-execution local
//! workdir manager, the download boundary for fetching input files, and the
//! shared storage publisher for durable results.

pub mod download;
pub mod error;
pub mod shared;
pub mod workdir;
