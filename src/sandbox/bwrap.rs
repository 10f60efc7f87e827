use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::Sandbox;
use crate::types::ResourceLimits;
use crate::wrap;

/// Configuration for the bubblewrap-backed sandbox. Built once per run and
/// immutable afterwards; everything a run needs to know about its
/// confinement lives here.
#[derive(Debug, Clone)]
pub struct BwrapConfig {
    /// The bubblewrap binary
    pub bwrap_path: String,
    /// The run's workspace directory on the host
    pub workspace: PathBuf,
    /// Where the workspace appears inside the sandbox
    pub inner_workspace: PathBuf,
    /// Read-only bind mounts exposing a minimal host root
    pub ro_binds: Vec<(PathBuf, PathBuf)>,
    /// Ephemeral writable mounts
    pub tmpfs: Vec<PathBuf>,
    pub mount_proc: bool,
    pub mount_dev: bool,
    /// Synthetic hostname inside the UTS namespace
    pub hostname: String,
    /// Explicit environment; nothing else leaks in
    pub env: Vec<(String, String)>,
    /// Named executables bound at `<inner_workspace>/<name>` so the program
    /// can invoke them without seeing the host layout
    pub executables: Vec<(String, PathBuf)>,
    /// File name of the usage report, relative to the workspace
    pub usage_report_file: String,
    /// Slack applied to `max_output_size` when deriving the file-size
    /// rlimit, so the capture files can exceed the cap by enough for the
    /// size check to observe the overflow
    pub fsize_slack: f64,
}

impl BwrapConfig {
    /// Defaults mirroring a minimal Linux root, rooted at `workspace`.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        let ro = |p: &str| (PathBuf::from(p), PathBuf::from(p));
        Self {
            bwrap_path: "bwrap".to_string(),
            workspace: workspace.into(),
            inner_workspace: PathBuf::from("/app"),
            ro_binds: vec![
                ro("/usr"),
                ro("/lib"),
                ro("/lib64"),
                ro("/bin"),
                ro("/sbin"),
                ro("/etc"),
            ],
            tmpfs: vec![PathBuf::from("/tmp")],
            mount_proc: true,
            mount_dev: true,
            hostname: "sandbox".to_string(),
            env: vec![("PATH".to_string(), "/usr/bin".to_string())],
            executables: Vec::new(),
            usage_report_file: "usage.txt".to_string(),
            fsize_slack: 1.1,
        }
    }

    /// A config for one fresh run: a uuid-named workspace under `parent`
    /// plus the executables the preparer needs bound into the sandbox.
    pub fn for_run(parent: &Path, executables: Vec<(String, PathBuf)>) -> Self {
        let mut config = Self::new(parent.join(format!("run-{}", Uuid::new_v4())));
        config.executables = executables;
        config
    }
}

/// Reference isolation provider: wraps the resource-limited command with
/// bubblewrap namespaces and a curated mount table.
pub struct BwrapSandbox {
    config: BwrapConfig,
}

impl BwrapSandbox {
    pub fn new(config: BwrapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BwrapConfig {
        &self.config
    }
}

impl Sandbox for BwrapSandbox {
    fn workspace(&self) -> &Path {
        &self.config.workspace
    }

    fn inner_workspace(&self) -> &Path {
        &self.config.inner_workspace
    }

    fn usage_report_path(&self) -> PathBuf {
        self.config.workspace.join(&self.config.usage_report_file)
    }

    fn wrap_command(&self, inner_cmd: &[String], limits: &ResourceLimits) -> Vec<String> {
        let config = &self.config;

        // Accounting innermost, deadline next, rlimits outermost: the
        // address-space cap must bound supervisor and program together.
        let report_in_sandbox = config.inner_workspace.join(&config.usage_report_file);
        let wrapped = wrap::with_usage_measurement(inner_cmd, &report_in_sandbox);
        let wrapped = wrap::with_timeout(&wrapped, limits.time_limit);
        let fsize_kb = (limits.max_output_size as f64 * config.fsize_slack) as u64;
        let wrapped = wrap::with_resource_limits(&wrapped, limits.memory_limit, fsize_kb);

        let mut cmd = vec![
            config.bwrap_path.clone(),
            "--unshare-all".to_string(),
            "--die-with-parent".to_string(),
        ];

        for (src, dst) in &config.ro_binds {
            if !src.exists() {
                warn!("Bind mount source {} does not exist. Skipping.", src.display());
                continue;
            }
            cmd.push("--ro-bind".to_string());
            cmd.push(src.to_string_lossy().into_owned());
            cmd.push(dst.to_string_lossy().into_owned());
        }

        cmd.push("--bind".to_string());
        cmd.push(config.workspace.to_string_lossy().into_owned());
        cmd.push(config.inner_workspace.to_string_lossy().into_owned());
        cmd.push("--chdir".to_string());
        cmd.push(config.inner_workspace.to_string_lossy().into_owned());

        for (name, path) in &config.executables {
            if !path.exists() {
                warn!(
                    "Executable path {} does not exist. Skipping bind mount.",
                    path.display()
                );
                continue;
            }
            cmd.push("--ro-bind".to_string());
            cmd.push(path.to_string_lossy().into_owned());
            cmd.push(config.inner_workspace.join(name).to_string_lossy().into_owned());
        }

        for tmpfs in &config.tmpfs {
            cmd.push("--tmpfs".to_string());
            cmd.push(tmpfs.to_string_lossy().into_owned());
        }
        if config.mount_proc {
            cmd.push("--proc".to_string());
            cmd.push("/proc".to_string());
        }
        if config.mount_dev {
            cmd.push("--dev".to_string());
            cmd.push("/dev".to_string());
        }

        cmd.push("--hostname".to_string());
        cmd.push(config.hostname.clone());

        for (key, value) in &config.env {
            cmd.push("--setenv".to_string());
            cmd.push(key.clone());
            cmd.push(value.clone());
        }

        cmd.push("--".to_string());
        cmd.extend(wrapped);

        debug!("Wrapped command: {:?}", cmd);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sandbox(workspace: &Path) -> BwrapSandbox {
        BwrapSandbox::new(BwrapConfig::new(workspace))
    }

    fn windows(cmd: &[String], needle: &[&str]) -> bool {
        cmd.windows(needle.len())
            .any(|w| w.iter().zip(needle).all(|(a, b)| a == b))
    }

    #[test]
    fn wrap_command_composes_isolation_around_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = test_sandbox(dir.path());
        let limits = ResourceLimits::default();
        let inner = vec!["/app/main".to_string()];

        let cmd = sandbox.wrap_command(&inner, &limits);

        assert_eq!(cmd[0], "bwrap");
        assert_eq!(cmd[1], "--unshare-all");
        assert_eq!(cmd[2], "--die-with-parent");
        assert!(windows(&cmd, &["--ro-bind", "/usr", "/usr"]));
        assert!(windows(
            &cmd,
            &["--bind", dir.path().to_str().unwrap(), "/app"]
        ));
        assert!(windows(&cmd, &["--chdir", "/app"]));
        assert!(windows(&cmd, &["--tmpfs", "/tmp"]));
        assert!(windows(&cmd, &["--hostname", "sandbox"]));
        assert!(windows(&cmd, &["--setenv", "PATH", "/usr/bin"]));

        // Everything after "--" is the wrapping chain, outermost first.
        let sep = cmd.iter().position(|a| a == "--").unwrap();
        let chain = &cmd[sep + 1..];
        assert_eq!(chain[0], "prlimit");
        let timeout_at = chain.iter().position(|a| a == "timeout").unwrap();
        let time_at = chain.iter().position(|a| a == "/usr/bin/time").unwrap();
        assert!(timeout_at < time_at);
        assert_eq!(chain.last().unwrap(), "/app/main");
    }

    #[test]
    fn fsize_limit_carries_the_slack_factor() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = test_sandbox(dir.path());
        let limits = ResourceLimits {
            max_output_size: 1000,
            ..ResourceLimits::default()
        };

        let cmd = sandbox.wrap_command(&["true".to_string()], &limits);
        let expected = format!("--fsize={}", 1100 * 1024);
        assert!(cmd.iter().any(|a| a == &expected));
    }

    #[test]
    fn missing_executables_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real-interpreter");
        std::fs::write(&real, b"#!/bin/sh\n").unwrap();

        let mut config = BwrapConfig::new(dir.path().join("ws"));
        config.executables = vec![
            ("python".to_string(), real.clone()),
            ("ghost".to_string(), PathBuf::from("/nonexistent/interpreter")),
        ];
        let sandbox = BwrapSandbox::new(config);

        let cmd = sandbox.wrap_command(&["true".to_string()], &ResourceLimits::default());
        assert!(windows(
            &cmd,
            &["--ro-bind", real.to_str().unwrap(), "/app/python"]
        ));
        assert!(!cmd.iter().any(|a| a.contains("ghost")));
    }

    #[tokio::test]
    async fn reset_workspace_clears_and_recreates() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("ws");
        let sandbox = test_sandbox(&workspace);

        // Missing directory: reset must still succeed.
        sandbox.reset_workspace().await.unwrap();
        assert!(workspace.is_dir());

        std::fs::write(workspace.join("stale.txt"), b"leftover").unwrap();
        sandbox.reset_workspace().await.unwrap();
        assert!(workspace.is_dir());
        assert_eq!(std::fs::read_dir(&workspace).unwrap().count(), 0);
    }

    #[test]
    fn for_run_yields_distinct_workspaces() {
        let parent = PathBuf::from("/var/lib/execbox");
        let a = BwrapConfig::for_run(&parent, Vec::new());
        let b = BwrapConfig::for_run(&parent, Vec::new());
        assert_ne!(a.workspace, b.workspace);
        assert!(a.workspace.starts_with(&parent));
    }
}
