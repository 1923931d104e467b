//! Windows adapter: `wmic`/`tasklist` enumeration, `taskkill`, `netstat`.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use super::{run_tool, utils, PlatformAdapter};
use crate::error::{Error, Result};
use crate::models::ProcessRecord;

/// Windows-specific platform adapter.
pub struct WindowsAdapter;

impl WindowsAdapter {
    /// Create a new Windows adapter.
    pub fn new() -> Self {
        Self
    }

    /// Parse `wmic process get ... /FORMAT:CSV` output.
    ///
    /// Columns come back alphabetically regardless of the requested order:
    /// ```text
    /// Node,CommandLine,ExecutablePath,Name,ParentProcessId,ProcessId
    /// ```
    /// The command line may itself contain commas, so the fixed fields are
    /// peeled off from the right.
    fn parse_wmic_output(output: &str) -> Vec<ProcessRecord> {
        let mut records = Vec::new();

        for line in output.lines() {
            let line = line.trim().trim_start_matches('\u{feff}');
            if line.is_empty() || line.starts_with("Node,") {
                continue;
            }

            let Some((_node, rest)) = line.split_once(',') else {
                continue;
            };

            let fields: Vec<&str> = rest.rsplitn(4, ',').collect();
            if fields.len() != 4 {
                continue;
            }

            // rsplitn yields right-to-left.
            let Ok(pid) = fields[0].trim().parse::<u32>() else {
                continue;
            };
            let parent_pid = fields[1].trim().parse::<u32>().ok();
            let name = fields[2].trim().to_string();

            // What remains is "CommandLine,ExecutablePath"; the executable
            // path is the rightmost comma-free field.
            let (cmdline, exe_path) = match fields[3].rsplit_once(',') {
                Some((cmdline, exe)) => (cmdline.to_string(), exe.to_string()),
                None => (fields[3].to_string(), String::new()),
            };

            let mut record = ProcessRecord::new(pid, name)
                .with_cmdline(cmdline)
                .with_exe_path(exe_path);
            record.parent_pid = parent_pid;
            records.push(record);
        }

        records
    }

    /// Parse `tasklist /FO CSV /NH` output, the fallback when wmic is
    /// absent. Yields name and PID only.
    ///
    /// Example output:
    /// ```text
    /// "chrome.exe","5432","Console","1","45,000 K"
    /// ```
    fn parse_tasklist_output(output: &str) -> Vec<ProcessRecord> {
        let mut records = Vec::new();

        for line in output.lines() {
            let line = line.trim();
            if line.is_empty() || !line.starts_with('"') {
                continue;
            }

            let fields: Vec<&str> = line.split("\",\"").collect();
            if fields.len() < 2 {
                continue;
            }

            let name = fields[0].trim_start_matches('"').to_string();
            let Ok(pid) = fields[1].trim_end_matches('"').parse::<u32>() else {
                continue;
            };

            records.push(ProcessRecord::new(pid, name));
        }

        records
    }

    /// Parse `netstat -ano -p tcp` output for the owner of one port.
    ///
    /// Example output:
    /// ```text
    ///   Proto  Local Address          Foreign Address        State           PID
    ///   TCP    127.0.0.1:9222         0.0.0.0:0              LISTENING       5432
    /// ```
    fn parse_netstat_output(output: &str, port: u16) -> Option<u32> {
        for line in output.lines() {
            let line = line.trim();
            if !line.starts_with("TCP") {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 || parts[3] != "LISTENING" {
                continue;
            }

            let Some(local_port) = utils::parse_port(parts[1]) else {
                continue;
            };
            if local_port != port {
                continue;
            }

            if let Ok(pid) = parts[4].parse() {
                return Some(pid);
            }
        }

        None
    }
}

impl Default for WindowsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for WindowsAdapter {
    async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        let wmic = run_tool(
            Command::new("wmic")
                .args([
                    "process",
                    "get",
                    "CommandLine,ExecutablePath,Name,ParentProcessId,ProcessId",
                    "/FORMAT:CSV",
                ])
                .stdout(Stdio::piped())
                .stderr(Stdio::null()),
            "wmic",
        )
        .await;

        let output = match wmic {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let records = Self::parse_wmic_output(&stdout);
                debug!(count = records.len(), "process table scanned via wmic");
                return Ok(records);
            }
            Err(Error::ToolUnavailable(_)) => {
                // wmic is gone on recent Windows builds; tasklist still
                // yields names and PIDs for the heuristics.
                warn!("wmic unavailable, falling back to tasklist");
                run_tool(
                    Command::new("tasklist")
                        .args(["/FO", "CSV", "/NH"])
                        .stdout(Stdio::piped())
                        .stderr(Stdio::null()),
                    "tasklist",
                )
                .await?
            }
            Err(e) => return Err(e),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = Self::parse_tasklist_output(&stdout);
        debug!(count = records.len(), "process table scanned via tasklist");
        Ok(records)
    }

    /// Terminate a process using taskkill.
    ///
    /// `taskkill /PID xxx` requests graceful termination (WM_CLOSE);
    /// `/F` forces it (TerminateProcess).
    async fn terminate(&self, pid: u32, force: bool) -> Result<bool> {
        let mut cmd = Command::new("taskkill");
        cmd.arg("/PID").arg(pid.to_string());
        if force {
            cmd.arg("/F");
        }

        let output = run_tool(&mut cmd, "taskkill").await?;

        if output.status.success() {
            debug!(pid = pid, force = force, "taskkill succeeded");
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let combined = format!("{} {}", stdout, stderr);

        if combined.contains("not found") || combined.contains("could not be found") {
            debug!(pid = pid, "process not found, already terminated");
            return Ok(true);
        }

        if combined.contains("already been terminated") || combined.contains("has exited") {
            return Ok(true);
        }

        if combined.contains("Access is denied") || combined.contains("access denied") {
            return Err(Error::PermissionDenied(pid));
        }

        Err(Error::CommandFailed(format!(
            "taskkill /PID {} {} failed: {}",
            pid,
            if force { "/F" } else { "" },
            combined.trim()
        )))
    }

    async fn resolve_port_owner(&self, port: u16) -> Result<Option<u32>> {
        let output = run_tool(
            Command::new("netstat")
                .args(["-ano", "-p", "tcp"])
                .stdout(Stdio::piped())
                .stderr(Stdio::null()),
            "netstat",
        )
        .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Self::parse_netstat_output(&stdout, port))
    }
}
