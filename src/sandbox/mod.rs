//! Isolation provider contract and result classification.
//!
//! A [`Sandbox`] owns one run's workspace directory, turns an inner command
//! into a fully wrapped invocation, and maps a finished process back into an
//! [`ExecutionResult`]. The reference implementation is [`BwrapSandbox`];
//! anything else (a different confinement backend, a passthrough for tests)
//! only needs the three required methods.

mod bwrap;

pub use bwrap::{BwrapConfig, BwrapSandbox};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::warn;

use crate::types::{ExecutionResult, ExecutionStatus, ResourceLimits};
use crate::usage::UsageReport;
use crate::wrap::{OOM_EXIT_CODE, TIMEOUT_EXIT_CODE};
use crate::Result;

#[async_trait]
pub trait Sandbox: Send + Sync {
    /// The run's workspace directory on the host.
    fn workspace(&self) -> &Path;

    /// The same directory as the confined process sees it.
    fn inner_workspace(&self) -> &Path;

    /// Host path of the resource-usage report the measurement wrapper writes.
    fn usage_report_path(&self) -> PathBuf;

    /// Wraps an inner command with resource accounting, the wall-clock
    /// deadline, kernel resource limits, and isolation.
    fn wrap_command(&self, inner_cmd: &[String], limits: &ResourceLimits) -> Vec<String>;

    /// Destroys and recreates the workspace. Safe when the directory does
    /// not exist yet; afterwards it exists and is empty.
    async fn reset_workspace(&self) -> Result<()> {
        match fs::remove_dir_all(self.workspace()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(self.workspace()).await?;
        Ok(())
    }

    /// Classifies a finished process into an [`ExecutionResult`], consuming
    /// (reading, then deleting) the usage report file. A missing or
    /// unreadable report only costs the usage data, never the result.
    #[allow(clippy::too_many_arguments)]
    async fn make_execution_result(
        &self,
        full_cmd: Vec<String>,
        stdout: String,
        stderr: String,
        return_code: Option<i32>,
        compile_time: Option<Duration>,
        execution_time: Option<Duration>,
        limits: &ResourceLimits,
    ) -> ExecutionResult {
        let report_path = self.usage_report_path();
        let usage = match fs::read_to_string(&report_path).await {
            Ok(text) => Some(UsageReport::parse(&text)),
            Err(e) => {
                warn!("Failed to read usage report {}: {}", report_path.display(), e);
                None
            }
        };
        let _ = fs::remove_file(&report_path).await;

        let (status, error_info) = classify(
            return_code,
            &stdout,
            &stderr,
            usage.as_ref(),
            execution_time,
            limits,
        );

        ExecutionResult {
            full_cmd,
            status,
            return_code,
            stdout: Some(stdout),
            stderr: Some(stderr),
            compile_time,
            execution_time,
            error_info,
            usage,
        }
    }
}

/// Maps `{exit code, captured sizes, usage report}` to a status and
/// diagnostic.
///
/// The sentinel codes 124 and 137 are trusted unconditionally: a program
/// that chooses to exit with one of them is indistinguishable from a
/// timeout or an OOM kill, and is reported as such. The output-size checks
/// run last and override anything above them, stderr after stdout.
pub(crate) fn classify(
    return_code: Option<i32>,
    stdout: &str,
    stderr: &str,
    usage: Option<&UsageReport>,
    execution_time: Option<Duration>,
    limits: &ResourceLimits,
) -> (ExecutionStatus, Option<String>) {
    let (mut status, mut error_info) = match return_code {
        Some(TIMEOUT_EXIT_CODE) => {
            let elapsed = execution_time
                .map(|t| format!("{:.2}", t.as_secs_f64()))
                .unwrap_or_else(|| "unknown".to_string());
            (
                ExecutionStatus::TimeLimitExceeded,
                Some(format!(
                    "Time limit exceeded. Execution time: {} seconds.",
                    elapsed
                )),
            )
        }
        Some(OOM_EXIT_CODE) => {
            let peak = usage
                .and_then(|u| u.max_resident_set_size)
                .map(|kb| kb.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            (
                ExecutionStatus::MemoryLimitExceeded,
                Some(format!("Memory limit exceeded. Peak memory: {} KB.", peak)),
            )
        }
        Some(0) => (ExecutionStatus::Success, None),
        Some(code) => (
            ExecutionStatus::RuntimeError,
            Some(format!(
                "Unknown runtime error. Return code: {}. stderr: {}",
                code, stderr
            )),
        ),
        None => (
            ExecutionStatus::RuntimeError,
            Some(format!("Process killed by a signal. stderr: {}", stderr)),
        ),
    };

    let stdout_kb = size_kb(stdout);
    if stdout_kb > limits.max_output_size as f64 {
        status = ExecutionStatus::OutputTooLarge;
        error_info = Some(format!("Standard output too large. Size: {} KB.", stdout_kb));
    }
    let stderr_kb = size_kb(stderr);
    if stderr_kb > limits.max_output_size as f64 {
        status = ExecutionStatus::OutputTooLarge;
        error_info = Some(format!("Standard error too large. Size: {} KB.", stderr_kb));
    }

    (status, error_info)
}

/// Byte length in KB, rounded to two decimals.
fn size_kb(text: &str) -> f64 {
    (text.len() as f64 / 1024.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ResourceLimits {
        ResourceLimits::default()
    }

    #[test]
    fn exit_zero_is_success() {
        let (status, info) = classify(Some(0), "out", "", None, None, &limits());
        assert_eq!(status, ExecutionStatus::Success);
        assert!(info.is_none());
    }

    #[test]
    fn code_124_is_always_a_timeout() {
        let (status, info) = classify(
            Some(124),
            "",
            "",
            None,
            Some(Duration::from_secs_f64(1.5)),
            &limits(),
        );
        assert_eq!(status, ExecutionStatus::TimeLimitExceeded);
        assert!(info.unwrap().contains("1.50 seconds"));
    }

    #[test]
    fn code_137_reports_peak_memory_from_the_usage_report() {
        let usage = UsageReport {
            max_resident_set_size: Some(262144),
            ..UsageReport::default()
        };
        let (status, info) = classify(Some(137), "", "", Some(&usage), None, &limits());
        assert_eq!(status, ExecutionStatus::MemoryLimitExceeded);
        assert!(info.unwrap().contains("262144 KB"));
    }

    #[test]
    fn code_137_without_a_report_says_unknown() {
        let (status, info) = classify(Some(137), "", "", None, None, &limits());
        assert_eq!(status, ExecutionStatus::MemoryLimitExceeded);
        assert!(info.unwrap().contains("unknown"));
    }

    #[test]
    fn other_nonzero_codes_are_runtime_errors() {
        let (status, info) = classify(Some(3), "", "boom", None, None, &limits());
        assert_eq!(status, ExecutionStatus::RuntimeError);
        let info = info.unwrap();
        assert!(info.contains("Return code: 3"));
        assert!(info.contains("boom"));
    }

    #[test]
    fn signal_death_is_a_runtime_error() {
        let (status, _) = classify(None, "", "", None, None, &limits());
        assert_eq!(status, ExecutionStatus::RuntimeError);
    }

    #[test]
    fn oversized_stdout_overrides_success() {
        let mut limits = limits();
        limits.max_output_size = 1;
        let stdout = "x".repeat(2048);
        let (status, info) = classify(Some(0), &stdout, "", None, None, &limits);
        assert_eq!(status, ExecutionStatus::OutputTooLarge);
        assert!(info.unwrap().contains("Standard output"));
    }

    #[test]
    fn oversized_stderr_overrides_a_timeout_verdict() {
        let mut limits = limits();
        limits.max_output_size = 1;
        let stderr = "x".repeat(2048);
        let (status, info) = classify(Some(124), "", &stderr, None, None, &limits);
        assert_eq!(status, ExecutionStatus::OutputTooLarge);
        assert!(info.unwrap().contains("Standard error"));
    }

    // Both streams over the cap: the stderr check runs after the stdout
    // check and wins. Intentional last-check-wins tie-break.
    #[test]
    fn stderr_wins_when_both_streams_are_oversized() {
        let mut limits = limits();
        limits.max_output_size = 1;
        let big = "x".repeat(4096);
        let (status, info) = classify(Some(0), &big, &big, None, None, &limits);
        assert_eq!(status, ExecutionStatus::OutputTooLarge);
        assert!(info.unwrap().contains("Standard error"));
    }

    #[test]
    fn output_exactly_at_the_cap_passes() {
        let mut limits = limits();
        limits.max_output_size = 1;
        let stdout = "x".repeat(1024);
        let (status, _) = classify(Some(0), &stdout, "", None, None, &limits);
        assert_eq!(status, ExecutionStatus::Success);
    }
}
