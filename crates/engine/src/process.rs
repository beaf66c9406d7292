//! Subprocess invocation for the shell runner.
//!
//! Spawns one child process with piped stdio, captures bounded
//! stdout/stderr, and reports the exit status. The child is configured
//! with `kill_on_drop`, so when the engine's timeout cancels the future
//! holding it, the process dies with it; the engine owns the deadline, not
//! this module.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::RunError;

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output exceeding this limit is truncated to prevent memory exhaustion
/// from extremely verbose scripts.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// CommandSpec / CommandOutcome
// ---------------------------------------------------------------------------

/// One fully resolved child process invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Working directory of the child (the execution's workdir root).
    pub cwd: PathBuf,
}

/// Captured result of one finished child process.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

// ---------------------------------------------------------------------------
// run_command
// ---------------------------------------------------------------------------

/// Spawn the child described by `spec` and wait for it to exit.
///
/// A spawn failure (missing script, permission denied) and a non-spawnable
/// state both surface as a process-kind [`RunError`]; a non-zero exit is
/// reported through [`CommandOutcome`], not as an error, so the caller can
/// attach stderr to its failure message.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutcome, RunError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| {
        RunError::process(format!("failed to spawn '{}': {e}", spec.program))
    })?;

    // Read stdout/stderr in spawned tasks so `child.wait()` (which borrows
    // `&mut child`) can run concurrently with the capture.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let status = child
        .wait()
        .await
        .map_err(|e| RunError::process(format!("failed waiting for '{}': {e}", spec.program)))?;

    let stdout_bytes = stdout_task.await.unwrap_or_default();
    let stderr_bytes = stderr_task.await.unwrap_or_default();
    Ok(CommandOutcome {
        exit_code: status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        duration: start.elapsed(),
    })
}

/// Read an entire output stream into a byte buffer, capped at
/// [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Helper to create a temporary shell script from the given body.
    fn write_temp_script(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new()
            .suffix(".sh")
            .tempfile()
            .expect("create temp file");
        writeln!(f, "#!/bin/bash").expect("write shebang");
        write!(f, "{body}").expect("write body");
        f
    }

    fn spec_for(script: &tempfile::NamedTempFile, cwd: &std::path::Path) -> CommandSpec {
        CommandSpec {
            program: "bash".into(),
            args: vec![script.path().to_string_lossy().into_owned()],
            env: vec![],
            cwd: cwd.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_temp_script("echo hello\n");
        let outcome = run_command(&spec_for(&script, dir.path())).await.expect("run");
        assert!(outcome.succeeded());
        assert!(outcome.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn reports_nonzero_exit_through_outcome() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_temp_script("echo oops >&2\nexit 42\n");
        let outcome = run_command(&spec_for(&script, dir.path())).await.expect("run");
        assert!(!outcome.succeeded());
        assert_eq!(outcome.exit_code, 42);
        assert!(outcome.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn env_vars_reach_the_child() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_temp_script("echo $MY_VAR\n");
        let mut spec = spec_for(&script, dir.path());
        spec.env.push(("MY_VAR".into(), "hello_world".into()));
        let outcome = run_command(&spec).await.expect("run");
        assert!(outcome.stdout.contains("hello_world"));
    }

    #[tokio::test]
    async fn child_runs_in_the_requested_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_temp_script("touch marker.txt\n");
        let outcome = run_command(&spec_for(&script, dir.path())).await.expect("run");
        assert!(outcome.succeeded());
        assert!(dir.path().join("marker.txt").is_file());
    }

    #[tokio::test]
    async fn missing_program_is_a_process_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = CommandSpec {
            program: "/definitely/not/a/program".into(),
            args: vec![],
            env: vec![],
            cwd: dir.path().to_path_buf(),
        };
        let err = run_command(&spec).await.unwrap_err();
        assert_eq!(err.kind, crate::error::FailureKind::Process);
    }
}
