//! Linux adapter: `/proc` enumeration, POSIX signals, `ss` port lookup.

use std::path::Path;
use std::process::Stdio;

use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use super::{posix, run_tool, utils, PlatformAdapter};
use crate::error::{Error, Result};
use crate::models::ProcessRecord;

/// Linux-specific platform adapter.
pub struct LinuxAdapter;

impl LinuxAdapter {
    /// Create a new Linux adapter.
    pub fn new() -> Self {
        Self
    }

    /// Read one `/proc/<pid>` entry into a record.
    ///
    /// Any read failure (permission, process exited mid-scan) drops the
    /// entry, never the scan.
    fn read_record(pid_dir: &Path, pid: u32) -> Option<ProcessRecord> {
        let stat = std::fs::read_to_string(pid_dir.join("stat")).ok()?;

        // comm is parenthesized and may itself contain spaces or parens;
        // the numeric fields resume after the last ')'.
        let open = stat.find('(')?;
        let close = stat.rfind(')')?;
        let name = stat.get(open + 1..close)?.to_string();

        let mut fields = stat.get(close + 1..)?.split_whitespace();
        let _state = fields.next()?;
        let ppid: u32 = fields.next()?.parse().ok()?;

        let cmdline = std::fs::read(pid_dir.join("cmdline"))
            .map(|bytes| {
                String::from_utf8_lossy(&bytes)
                    .split('\0')
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let exe_path = std::fs::read_link(pid_dir.join("exe"))
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        Some(
            ProcessRecord::new(pid, name)
                .with_cmdline(cmdline)
                .with_exe_path(exe_path)
                .with_parent(ppid),
        )
    }

    fn scan_proc(&self) -> Result<Vec<ProcessRecord>> {
        let entries = std::fs::read_dir("/proc")
            .map_err(|_| Error::ToolUnavailable("/proc".to_string()))?;

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else {
                continue;
            };
            if let Some(record) = Self::read_record(&entry.path(), pid) {
                records.push(record);
            }
        }

        debug!(count = records.len(), "proc table scanned");
        Ok(records)
    }

    /// Parse `ss -Htlnp` output for the owner of one port.
    ///
    /// Expected line format:
    /// ```text
    /// LISTEN 0 4096 127.0.0.1:9222 0.0.0.0:* users:(("chrome",pid=53561,fd=54))
    /// ```
    fn parse_ss_output(output: &str, port: u16) -> Option<u32> {
        let pid_re = Regex::new(r"pid=(\d+)").ok()?;

        for line in output.lines() {
            let components: Vec<&str> = line.split_whitespace().collect();
            if components.len() < 6 {
                continue;
            }

            let Some(local_port) = utils::parse_port(components[3]) else {
                continue;
            };
            if local_port != port {
                continue;
            }

            let Some(caps) = pid_re.captures(components[5]) else {
                continue;
            };
            if let Ok(pid) = caps[1].parse() {
                return Some(pid);
            }
        }

        None
    }
}

impl Default for LinuxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for LinuxAdapter {
    async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        self.scan_proc()
    }

    async fn terminate(&self, pid: u32, force: bool) -> Result<bool> {
        posix::send_signal(pid, force)
    }

    /// Resolve a port owner via `ss`.
    ///
    /// Flags explained:
    /// -H, --no-header     Suppress header line
    /// -t, --tcp           display only TCP sockets
    /// -l, --listening     display listening sockets
    /// -n, --numeric       don't resolve service names
    /// -p, --processes     show process using socket
    async fn resolve_port_owner(&self, port: u16) -> Result<Option<u32>> {
        let output = run_tool(
            Command::new("ss")
                .args(["-Htlnp"])
                .stdout(Stdio::piped())
                .stderr(Stdio::null()),
            "ss",
        )
        .await?;

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in ss output: {}", e)))?;

        Ok(Self::parse_ss_output(&stdout, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ss_output() {
        let output = r#"LISTEN 0 4096 127.0.0.1:9222 0.0.0.0:* users:(("chrome",pid=55316,fd=6))
LISTEN 0 50 [::ffff:127.0.0.1]:9515 *:* users:(("chromedriver",pid=53561,fd=187))"#;

        assert_eq!(LinuxAdapter::parse_ss_output(output, 9222), Some(55316));
        assert_eq!(LinuxAdapter::parse_ss_output(output, 9515), Some(53561));
        assert_eq!(LinuxAdapter::parse_ss_output(output, 3000), None);
    }

    #[test]
    fn test_parse_ss_output_without_process_column() {
        // Sockets owned by other users have no users:(...) column worth
        // matching; the line is skipped rather than misparsed.
        let output = "LISTEN 0 4096 0.0.0.0:9222 0.0.0.0:*";
        assert_eq!(LinuxAdapter::parse_ss_output(output, 9222), None);
    }

    #[tokio::test]
    async fn test_list_processes_includes_self() {
        let adapter = LinuxAdapter::new();
        let records = adapter.list_processes().await.unwrap();

        let me = std::process::id();
        assert!(records.iter().any(|r| r.pid == me));
    }

    #[tokio::test]
    async fn test_terminate_nonexistent_is_success() {
        let adapter = LinuxAdapter::new();
        let result = adapter.terminate(999_999_999, true).await;
        match result {
            Ok(true) => {}
            Err(Error::PermissionDenied(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
