use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::executor::ProgramPreparer;
use crate::types::PreparedProgram;
use crate::{Error, Result};

const SOURCE_FILE: &str = "main.py";

/// In-sandbox name the interpreter is bound under; the prepared command
/// never mentions the host's interpreter path.
const INTERPRETER_NAME: &str = "python";

pub struct PythonPreparer {
    interpreter: PathBuf,
    args: Vec<String>,
}

impl PythonPreparer {
    /// `interpreter` defaults to whatever `python3` resolves to on the
    /// host, falling back to `/usr/bin/python3`.
    pub fn new(interpreter: Option<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.unwrap_or_else(|| {
                which::which("python3").unwrap_or_else(|_| PathBuf::from("/usr/bin/python3"))
            }),
            args: Vec::new(),
        }
    }

    /// Extra interpreter arguments, inserted before the script path.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

#[async_trait]
impl ProgramPreparer for PythonPreparer {
    fn executables(&self) -> Vec<(String, PathBuf)> {
        vec![(INTERPRETER_NAME.to_string(), self.interpreter.clone())]
    }

    async fn prepare(
        &self,
        workspace: &Path,
        inner_workspace: &Path,
        source: &str,
    ) -> Result<PreparedProgram> {
        fs::write(workspace.join(SOURCE_FILE), source)
            .await
            .map_err(|e| Error::Preparation(format!("Failed to write source file: {}", e)))?;

        let mut command = vec![inner_workspace
            .join(INTERPRETER_NAME)
            .to_string_lossy()
            .into_owned()];
        command.extend(self.args.iter().cloned());
        command.push(inner_workspace.join(SOURCE_FILE).to_string_lossy().into_owned());

        Ok(PreparedProgram::interpreted(command))
    }
}
