use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::usage::UsageReport;

/// Supported programming languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Cpp,
}

impl FromStr for Language {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "python" => Ok(Language::Python),
            "cpp" | "c++" => Ok(Language::Cpp),
            _ => Err(crate::Error::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// One unit of work for the service: run `code` against every entry of
/// `inputs`, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Programming language
    pub language: Language,
    /// Source code to execute
    pub code: String,
    /// One stdin payload per run
    #[serde(default)]
    pub inputs: Vec<String>,
}

/// Resource budgets for one batch run. Immutable once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall-clock limit per input
    #[serde(with = "duration_serde")]
    pub time_limit: Duration,
    /// Wall-clock limit across all inputs of one batch
    #[serde(with = "duration_serde")]
    pub overall_time_limit: Duration,
    /// Address-space cap in KB
    pub memory_limit: u64,
    /// Maximum accepted stdin payload in KB
    pub max_input_size: u64,
    /// Maximum captured stdout/stderr size in KB
    pub max_output_size: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(5),
            overall_time_limit: Duration::from_secs(30),
            memory_limit: 256 * 1024, // 256MB
            max_input_size: 2 * 1024, // 2MB
            max_output_size: 2 * 1024, // 2MB
        }
    }
}

impl ResourceLimits {
    /// Every budget must be strictly positive.
    pub fn validate(&self) -> crate::Result<()> {
        if self.time_limit.is_zero() || self.overall_time_limit.is_zero() {
            return Err(crate::Error::InvalidLimits(
                "time limits must be positive".to_string(),
            ));
        }
        if self.memory_limit == 0 || self.max_input_size == 0 || self.max_output_size == 0 {
            return Err(crate::Error::InvalidLimits(
                "size limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why an execution attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    InputTooLarge,
    OutputTooLarge,
    RuntimeError,
    CompileError,
    Skipped,
    /// Infrastructure failure, not attributable to the submitted program
    Error,
}

/// Outcome of one input's execution attempt. Constructed once, then
/// read-only; serializable for transport to a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The command vector actually spawned, for diagnosability. Empty when
    /// nothing was spawned (admission rejections, compile failures).
    #[serde(default)]
    pub full_cmd: Vec<String>,
    /// Execution status
    pub status: ExecutionStatus,
    /// Raw exit code; `None` when the process died to a signal or never ran
    pub return_code: Option<i32>,
    /// Captured stdout, lossily decoded
    pub stdout: Option<String>,
    /// Captured stderr, lossily decoded
    pub stderr: Option<String>,
    /// Duration of the compile step, when the language has one
    #[serde(with = "duration_serde::option")]
    pub compile_time: Option<Duration>,
    /// Wall-clock duration of the spawn+wait
    #[serde(with = "duration_serde::option")]
    pub execution_time: Option<Duration>,
    /// Human-readable diagnostic for non-success outcomes
    pub error_info: Option<String>,
    /// Parsed resource accounting, when the report survived the run
    pub usage: Option<UsageReport>,
}

impl ExecutionResult {
    /// Admission rejection: the batch time budget was already exhausted.
    pub fn skipped(compile_time: Option<Duration>) -> Self {
        Self::unexecuted(
            ExecutionStatus::Skipped,
            compile_time,
            "Skipped due to overall time limit exceeded.".to_string(),
        )
    }

    /// Admission rejection: stdin payload over `max_input_size`.
    pub fn input_too_large(compile_time: Option<Duration>) -> Self {
        Self::unexecuted(
            ExecutionStatus::InputTooLarge,
            compile_time,
            "Input too large.".to_string(),
        )
    }

    /// The preparer failed to produce a runnable artifact.
    pub fn compile_error(
        compile_time: Option<Duration>,
        compile_return_code: i32,
        compile_stderr: &str,
    ) -> Self {
        Self::unexecuted(
            ExecutionStatus::CompileError,
            compile_time,
            format!(
                "Compilation failed. Return code: {}. Stderr: {}",
                compile_return_code, compile_stderr
            ),
        )
    }

    /// Infrastructure failure while spawning or waiting on the process.
    pub fn infra_error(
        full_cmd: Vec<String>,
        compile_time: Option<Duration>,
        error_info: String,
    ) -> Self {
        Self {
            full_cmd,
            status: ExecutionStatus::Error,
            return_code: None,
            stdout: None,
            stderr: None,
            compile_time,
            execution_time: None,
            error_info: Some(error_info),
            usage: None,
        }
    }

    fn unexecuted(
        status: ExecutionStatus,
        compile_time: Option<Duration>,
        error_info: String,
    ) -> Self {
        Self {
            full_cmd: Vec::new(),
            status,
            return_code: None,
            stdout: None,
            stderr: None,
            compile_time,
            execution_time: None,
            error_info: Some(error_info),
            usage: None,
        }
    }
}

/// What a preparer hands back: the in-sandbox command to run the program,
/// plus compile diagnostics when a compile step happened. Lives for one
/// batch run.
#[derive(Debug, Clone)]
pub struct PreparedProgram {
    /// Command vector as seen inside the sandbox
    pub command: Vec<String>,
    /// Duration of the compile step
    pub compile_time: Option<Duration>,
    /// Compiler exit code; `None` for interpreted languages
    pub compile_return_code: Option<i32>,
    /// Compiler stdout
    pub compile_stdout: Option<String>,
    /// Compiler stderr
    pub compile_stderr: Option<String>,
}

impl PreparedProgram {
    /// An interpreted program: nothing was compiled.
    pub fn interpreted(command: Vec<String>) -> Self {
        Self {
            command,
            compile_time: None,
            compile_return_code: None,
            compile_stdout: None,
            compile_stderr: None,
        }
    }
}


pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => serializer.serialize_some(&d.as_secs_f64()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let secs = Option::<f64>::deserialize(deserializer)?;
            Ok(secs.map(Duration::from_secs_f64))
        }
    }
}
