use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::fs;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::sandbox::Sandbox;
use crate::types::{ExecutionResult, PreparedProgram, ResourceLimits};
use crate::Result;

const STDOUT_CAPTURE: &str = "stdout.txt";
const STDERR_CAPTURE: &str = "stderr.txt";

/// Trait for language-specific program preparers: materialize the program
/// in the workspace and hand back the command that runs it. A preparer
/// never runs the prepared program itself.
#[async_trait]
pub trait ProgramPreparer: Send + Sync {
    /// Host executables the sandbox must bind for the prepared command to
    /// work (e.g. an interpreter), keyed by their in-sandbox name.
    fn executables(&self) -> Vec<(String, PathBuf)> {
        Vec::new()
    }

    /// Writes (and for compiled languages, builds) the program under
    /// `workspace`. The returned command is denominated in
    /// `inner_workspace` paths. A failing compiler is reported through
    /// `PreparedProgram::compile_return_code`, not as an `Err`.
    async fn prepare(
        &self,
        workspace: &Path,
        inner_workspace: &Path,
        source: &str,
    ) -> Result<PreparedProgram>;
}

/// The batch-run engine: one prepared program against many inputs, under a
/// shared wall-clock budget, inside one sandbox-owned workspace.
pub struct BatchExecutor {
    preparer: Box<dyn ProgramPreparer>,
    sandbox: Box<dyn Sandbox>,
}

impl BatchExecutor {
    pub fn new(preparer: Box<dyn ProgramPreparer>, sandbox: Box<dyn Sandbox>) -> Self {
        Self { preparer, sandbox }
    }

    /// Runs `code` against every input, in order. Always returns one result
    /// per input; per-input failures become that input's result and never
    /// abort the batch. Only workspace/preparation infrastructure failures
    /// surface as `Err`.
    pub async fn run(
        &self,
        code: &str,
        inputs: &[String],
        limits: &ResourceLimits,
    ) -> Result<Vec<ExecutionResult>> {
        self.sandbox.reset_workspace().await?;

        let prepared = self
            .preparer
            .prepare(self.sandbox.workspace(), self.sandbox.inner_workspace(), code)
            .await?;

        if let Some(compile_code) = prepared.compile_return_code {
            if compile_code != 0 {
                // Nothing to run: every input gets the same verdict.
                let stderr = prepared.compile_stderr.as_deref().unwrap_or("");
                let results = inputs
                    .iter()
                    .map(|_| {
                        ExecutionResult::compile_error(prepared.compile_time, compile_code, stderr)
                    })
                    .collect();
                self.sandbox.reset_workspace().await?;
                return Ok(results);
            }
        }

        let mut results = Vec::with_capacity(inputs.len());
        let batch_start = Instant::now();
        for input in inputs {
            if batch_start.elapsed() > limits.overall_time_limit {
                results.push(ExecutionResult::skipped(prepared.compile_time));
                continue;
            }
            if input.len() as u64 > limits.max_input_size * 1024 {
                results.push(ExecutionResult::input_too_large(prepared.compile_time));
                continue;
            }
            results.push(self.single_run(input, &prepared, limits).await);
        }

        self.sandbox.reset_workspace().await?;
        Ok(results)
    }

    /// One spawn: input on stdin, both output streams captured to workspace
    /// files, wall clock measured around spawn+wait. Infrastructure
    /// failures yield an `Error`-status result, not an `Err`.
    async fn single_run(
        &self,
        input: &str,
        prepared: &PreparedProgram,
        limits: &ResourceLimits,
    ) -> ExecutionResult {
        let full_cmd = self.sandbox.wrap_command(&prepared.command, limits);
        debug!("Executing: {:?}", full_cmd);

        let stdout_path = self.sandbox.workspace().join(STDOUT_CAPTURE);
        let stderr_path = self.sandbox.workspace().join(STDERR_CAPTURE);

        let started = Instant::now();
        let status = match spawn_and_wait(&full_cmd, input, &stdout_path, &stderr_path).await {
            Ok(status) => status,
            Err(e) => {
                let _ = fs::remove_file(&stdout_path).await;
                let _ = fs::remove_file(&stderr_path).await;
                return ExecutionResult::infra_error(
                    full_cmd,
                    prepared.compile_time,
                    format!(
                        "Execution failed due to unexpected error. Execution message: {}",
                        e
                    ),
                );
            }
        };
        let execution_time = started.elapsed();

        let stdout = read_capture(&stdout_path).await;
        let stderr = read_capture(&stderr_path).await;

        self.sandbox
            .make_execution_result(
                full_cmd,
                stdout,
                stderr,
                status.code(),
                prepared.compile_time,
                Some(execution_time),
                limits,
            )
            .await
    }
}

async fn spawn_and_wait(
    full_cmd: &[String],
    input: &str,
    stdout_path: &Path,
    stderr_path: &Path,
) -> std::io::Result<std::process::ExitStatus> {
    let (program, args) = full_cmd.split_first().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command vector")
    })?;

    let stdout_file = File::create(stdout_path).await?.into_std().await;
    let stderr_file = File::create(stderr_path).await?.into_std().await;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file))
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(input.as_bytes()).await {
            // A child that exits without draining its stdin breaks the
            // pipe; its exit status still carries the verdict.
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                let _ = child.kill().await;
                return Err(e);
            }
        }
        // Dropping stdin signals EOF to the child.
        drop(stdin);
    }

    child.wait().await
}

/// Best-effort read of a capture file: undecodable bytes are replaced, the
/// file is removed afterwards.
async fn read_capture(path: &Path) -> String {
    let text = match fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    };
    let _ = fs::remove_file(path).await;
    text
}
