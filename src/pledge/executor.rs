use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use super::report::{ProbeReport, ProbeRequest};

/// argv[0] the probe child is started with.
pub const PROBE_ARG0: &str = "sbpledge-probe";

/// Run a probe in a fresh copy of this binary.
///
/// This is the parent-side function. It:
/// 1. Serializes the request to JSON
/// 2. Re-execs the current binary with argv[0]="sbpledge-probe"
/// 3. Collects the child's JSON report and enforces timeout
///
/// The calling process is never pledged.
pub async fn run_probe(request: &ProbeRequest, timeout_ms: u64) -> Result<ProbeReport> {
    let exe_path = std::env::current_exe()?;
    run_probe_with(&exe_path, request, timeout_ms).await
}

/// Run a probe in `exe`, which must be an `sbpledge` binary.
pub async fn run_probe_with(
    exe: &Path,
    request: &ProbeRequest,
    timeout_ms: u64,
) -> Result<ProbeReport> {
    let request_json = serde_json::to_string(request)?;

    let output = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        tokio::process::Command::new(exe)
            .arg0(PROBE_ARG0)
            .arg(&request_json)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Probe timed out after {}ms", timeout_ms))??;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        tracing::debug!("probe stderr:\n{}", stderr.trim_end());
    }

    if !output.status.success() {
        anyhow::bail!(
            "Probe exited with {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        );
    }

    parse_report(&output.stdout)
}

/// Decode the last non-empty stdout line as a report.
pub fn parse_report(stdout: &[u8]) -> Result<ProbeReport> {
    let stdout = String::from_utf8_lossy(stdout);
    let line = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .context("Probe produced no report")?;
    serde_json::from_str(line).context("Failed to parse probe report")
}

/// Trait extension for Command to set argv[0].
#[allow(dead_code)]
trait CommandExt {
    fn arg0(&mut self, arg0: &str) -> &mut Self;
}

#[cfg(unix)]
impl CommandExt for tokio::process::Command {
    fn arg0(&mut self, arg0: &str) -> &mut Self {
        use std::os::unix::process::CommandExt;
        self.as_std_mut().arg0(arg0);
        self
    }
}

#[cfg(not(unix))]
impl CommandExt for tokio::process::Command {
    fn arg0(&mut self, _arg0: &str) -> &mut Self {
        self
    }
}
