use serde::{Deserialize, Serialize};

/// Resource accounting for one finished process, parsed from the report the
/// measurement wrapper writes (see [`crate::wrap::with_usage_measurement`]).
///
/// Every field is independently optional: a line that is missing or fails to
/// parse leaves its field `None` and never aborts the rest of the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageReport {
    /// Command line as the measurement tool saw it
    pub command: Option<String>,
    /// Wall-clock time in seconds
    pub elapsed_time: Option<f64>,
    /// User-mode CPU time in seconds
    pub user_cpu_time: Option<f64>,
    /// Kernel-mode CPU time in seconds
    pub system_cpu_time: Option<f64>,
    /// CPU percentage, verbatim as reported (e.g. "98%")
    pub cpu_percentage: Option<String>,
    /// Average total memory use in KB
    pub avg_total_mem: Option<u64>,
    /// Average shared text size in KB
    pub avg_shared_mem: Option<u64>,
    /// Average unshared data size in KB
    pub avg_unshared_data: Option<u64>,
    /// Average unshared stack size in KB
    pub avg_unshared_stack: Option<u64>,
    /// Soft page faults
    pub page_reclaims: Option<u64>,
    /// Hard page faults
    pub page_faults: Option<u64>,
    pub swaps: Option<u64>,
    pub block_input_ops: Option<u64>,
    pub block_output_ops: Option<u64>,
    pub ipc_msgs_sent: Option<u64>,
    pub ipc_msgs_received: Option<u64>,
    pub signals_received: Option<u64>,
    pub voluntary_ctxt_switches: Option<u64>,
    pub involuntary_ctxt_switches: Option<u64>,
    /// Peak resident set size in KB
    pub max_resident_set_size: Option<u64>,
    /// Exit status as the measurement tool reported it
    pub exit_status: Option<i32>,
}

impl UsageReport {
    /// Parses newline-delimited `Label: value` records. Unknown labels and
    /// lines without a colon are ignored; a malformed value leaves that one
    /// field unset.
    pub fn parse(text: &str) -> Self {
        let mut report = UsageReport::default();

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "Command" => report.command = Some(value.to_string()),
                "Elapsed time" => report.elapsed_time = parse_elapsed(value),
                "User CPU time" => report.user_cpu_time = value.parse().ok(),
                "System CPU time" => report.system_cpu_time = value.parse().ok(),
                "CPU Percentage" => report.cpu_percentage = Some(value.to_string()),
                "Avg total memory usage" => report.avg_total_mem = parse_kb(value),
                "Avg shared memory size" => report.avg_shared_mem = parse_kb(value),
                "Avg unshared data size" => report.avg_unshared_data = parse_kb(value),
                "Avg unshared stack size" => report.avg_unshared_stack = parse_kb(value),
                "Page reclaims (soft page faults)" => report.page_reclaims = value.parse().ok(),
                "Page faults (hard page faults)" => report.page_faults = value.parse().ok(),
                "Swaps" => report.swaps = value.parse().ok(),
                "Block input operations" => report.block_input_ops = value.parse().ok(),
                "Block output operations" => report.block_output_ops = value.parse().ok(),
                "IPC messages sent" => report.ipc_msgs_sent = value.parse().ok(),
                "IPC messages received" => report.ipc_msgs_received = value.parse().ok(),
                "Signals received" => report.signals_received = value.parse().ok(),
                "Voluntary context switches" => {
                    report.voluntary_ctxt_switches = value.parse().ok()
                }
                "Involuntary context switches" => {
                    report.involuntary_ctxt_switches = value.parse().ok()
                }
                "Maximum resident set size" => report.max_resident_set_size = parse_kb(value),
                "Exit status" => report.exit_status = value.parse().ok(),
                _ => {}
            }
        }

        report
    }
}

/// Elapsed time arrives either as plain seconds ("2.05") or as
/// minutes:seconds ("1:02.50"); both collapse to seconds.
fn parse_elapsed(value: &str) -> Option<f64> {
    match value.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes.parse().ok()?;
            let seconds: f64 = seconds.parse().ok()?;
            Some(minutes as f64 * 60.0 + seconds)
        }
        None => value.parse().ok(),
    }
}

/// KB-denominated values carry a trailing unit token ("1234 KB").
fn parse_kb(value: &str) -> Option<u64> {
    value.split_whitespace().next()?.parse().ok()
}
