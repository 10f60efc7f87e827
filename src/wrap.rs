//! The command wrapping chain: pure functions that grow an argument vector
//! with resource accounting, a wall-clock deadline, and kernel resource
//! limits. Composition order is fixed (see [`BwrapSandbox`]): measurement
//! innermost so it accounts only the real program, then the timeout, then
//! the rlimits outermost so a runaway allocation is bounded even while the
//! timeout supervisor is still reacting.
//!
//! [`BwrapSandbox`]: crate::BwrapSandbox

use std::path::Path;
use std::time::Duration;

/// Exit code the timeout wrapper produces on expiry. Reserved: nothing else
/// in the chain may exit with this value intentionally.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code of a process killed by SIGKILL when the address-space cap is
/// hit. Reserved like [`TIMEOUT_EXIT_CODE`].
pub const OOM_EXIT_CODE: i32 = 137;

/// Report format handed to GNU time. One `Label: value` line per metric;
/// the labels are the vocabulary [`UsageReport::parse`] understands.
///
/// [`UsageReport::parse`]: crate::usage::UsageReport::parse
const USAGE_FORMAT: &str = "Command: %C\n\
Elapsed time: %E\n\
User CPU time: %U\n\
System CPU time: %S\n\
CPU Percentage: %P\n\
Avg total memory usage: %K KB\n\
Avg shared memory size: %D KB\n\
Avg unshared data size: %p KB\n\
Avg unshared stack size: %t KB\n\
Page reclaims (soft page faults): %R\n\
Page faults (hard page faults): %F\n\
Swaps: %W\n\
Block input operations: %I\n\
Block output operations: %O\n\
IPC messages sent: %r\n\
IPC messages received: %s\n\
Signals received: %k\n\
Voluntary context switches: %w\n\
Involuntary context switches: %c\n\
Maximum resident set size: %M KB\n\
Exit status: %x";

/// Prefixes `cmd` with a GNU time invocation that writes the usage report
/// to `report_path` (a path as seen by the spawned process, i.e. inside the
/// sandbox when one is in play).
pub fn with_usage_measurement(cmd: &[String], report_path: &Path) -> Vec<String> {
    let mut wrapped = vec![
        "/usr/bin/time".to_string(),
        "-f".to_string(),
        USAGE_FORMAT.to_string(),
        "-o".to_string(),
        report_path.to_string_lossy().into_owned(),
    ];
    wrapped.extend_from_slice(cmd);
    wrapped
}

/// Prefixes `cmd` with a `timeout` invocation. `--foreground` keeps the
/// child in the caller's process group so the expiry signal reaches it even
/// under an interactive parent; on expiry the resulting exit code is
/// [`TIMEOUT_EXIT_CODE`].
pub fn with_timeout(cmd: &[String], time_limit: Duration) -> Vec<String> {
    let mut wrapped = vec![
        "timeout".to_string(),
        "--foreground".to_string(),
        format!("{}s", time_limit.as_secs_f64()),
    ];
    wrapped.extend_from_slice(cmd);
    wrapped
}

/// Prefixes `cmd` with a `prlimit` invocation capping the address space and
/// the maximum file size of everything it executes. Limits arrive in KB and
/// leave in bytes.
pub fn with_resource_limits(cmd: &[String], memory_limit_kb: u64, fsize_limit_kb: u64) -> Vec<String> {
    let mut wrapped = vec![
        "prlimit".to_string(),
        format!("--as={}", memory_limit_kb * 1024),
        format!("--fsize={}", fsize_limit_kb * 1024),
        "--".to_string(),
    ];
    wrapped.extend_from_slice(cmd);
    wrapped
}
