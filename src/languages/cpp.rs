use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::executor::ProgramPreparer;
use crate::types::PreparedProgram;
use crate::{Error, Result};

const SOURCE_FILE: &str = "main.cpp";
const BINARY_FILE: &str = "main";

pub struct CppPreparer {
    compiler: PathBuf,
    flags: Vec<String>,
}

impl CppPreparer {
    /// `compiler` defaults to whatever `g++` resolves to on the host,
    /// falling back to `/usr/bin/g++`; `flags` default to `-std=c++17`.
    pub fn new(compiler: Option<PathBuf>, flags: Option<Vec<String>>) -> Self {
        Self {
            compiler: compiler.unwrap_or_else(|| {
                which::which("g++").unwrap_or_else(|_| PathBuf::from("/usr/bin/g++"))
            }),
            flags: flags.unwrap_or_else(|| vec!["-std=c++17".to_string()]),
        }
    }
}

#[async_trait]
impl ProgramPreparer for CppPreparer {
    async fn prepare(
        &self,
        workspace: &Path,
        inner_workspace: &Path,
        source: &str,
    ) -> Result<PreparedProgram> {
        let source_path = workspace.join(SOURCE_FILE);
        let binary_path = workspace.join(BINARY_FILE);

        fs::write(&source_path, source)
            .await
            .map_err(|e| Error::Preparation(format!("Failed to write source file: {}", e)))?;

        // The compile runs on the host, synchronously timed; only the
        // compiled binary ever enters the sandbox.
        let started = Instant::now();
        let output = Command::new(&self.compiler)
            .arg(&source_path)
            .arg("-o")
            .arg(&binary_path)
            .args(&self.flags)
            .output()
            .await
            .map_err(|e| {
                Error::Preparation(format!(
                    "Failed to invoke compiler {}: {}",
                    self.compiler.display(),
                    e
                ))
            })?;
        let compile_time = started.elapsed();
        debug!(
            "Compiled {} in {:.2}s, exit {:?}",
            source_path.display(),
            compile_time.as_secs_f64(),
            output.status.code()
        );

        Ok(PreparedProgram {
            command: vec![inner_workspace.join(BINARY_FILE).to_string_lossy().into_owned()],
            compile_time: Some(compile_time),
            compile_return_code: output.status.code(),
            compile_stdout: Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            compile_stderr: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
        })
    }
}
