use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::ProgramPreparer;
use crate::sandbox::Sandbox;
use crate::types::{PreparedProgram, ResourceLimits};
use crate::{wrap, Result};

/// A sandbox without isolation: commands run as-is on the host, optionally
/// under the timeout wrapper only. Keeps the batch tests independent of
/// bwrap, prlimit, and GNU time being installed; the absent usage report
/// exercises the tolerated missing-report path.
pub struct PassthroughSandbox {
    workspace: PathBuf,
    wrap_timeout: bool,
}

impl PassthroughSandbox {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            wrap_timeout: true,
        }
    }

    /// No wrapping at all; the spawned program is exactly the prepared one.
    pub fn raw(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            wrap_timeout: false,
        }
    }
}

impl Sandbox for PassthroughSandbox {
    fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn inner_workspace(&self) -> &Path {
        &self.workspace
    }

    fn usage_report_path(&self) -> PathBuf {
        self.workspace.join("usage.txt")
    }

    fn wrap_command(&self, inner_cmd: &[String], limits: &ResourceLimits) -> Vec<String> {
        if self.wrap_timeout {
            wrap::with_timeout(inner_cmd, limits.time_limit)
        } else {
            inner_cmd.to_vec()
        }
    }
}

/// Stands in for a prepared interpreted program: always the same command,
/// whatever the source says.
pub struct CommandPreparer {
    command: Vec<String>,
}

impl CommandPreparer {
    pub fn new<S: Into<String>>(command: impl IntoIterator<Item = S>) -> Self {
        Self {
            command: command.into_iter().map(Into::into).collect(),
        }
    }

    pub fn shell(script: &str) -> Self {
        Self::new(["/bin/sh", "-c", script])
    }
}

#[async_trait]
impl ProgramPreparer for CommandPreparer {
    async fn prepare(
        &self,
        _workspace: &Path,
        _inner_workspace: &Path,
        _source: &str,
    ) -> Result<PreparedProgram> {
        Ok(PreparedProgram::interpreted(self.command.clone()))
    }
}

/// A preparer whose compile step always fails.
pub struct FailingCompilePreparer;

#[async_trait]
impl ProgramPreparer for FailingCompilePreparer {
    async fn prepare(
        &self,
        _workspace: &Path,
        _inner_workspace: &Path,
        _source: &str,
    ) -> Result<PreparedProgram> {
        Ok(PreparedProgram {
            command: Vec::new(),
            compile_time: Some(Duration::from_millis(42)),
            compile_return_code: Some(1),
            compile_stdout: Some(String::new()),
            compile_stderr: Some("main.cpp:1:1: error: expected expression".to_string()),
        })
    }
}

pub fn test_limits() -> ResourceLimits {
    ResourceLimits::default()
}
