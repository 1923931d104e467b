//! macOS adapter: `ps` enumeration, POSIX signals, `lsof` port lookup.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::{posix, run_tool, utils, PlatformAdapter};
use crate::error::{Error, Result};
use crate::models::ProcessRecord;

/// macOS-specific platform adapter.
pub struct DarwinAdapter;

/// Take the next whitespace-delimited token and the rest of the line.
fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

impl DarwinAdapter {
    /// Create a new macOS adapter.
    pub fn new() -> Self {
        Self
    }

    /// Parse `ps -axo pid=,ppid=,args=` output.
    ///
    /// The pid columns are right-aligned, so each line is consumed token
    /// by token with the remainder taken as the command line.
    fn parse_ps_output(output: &str) -> Vec<ProcessRecord> {
        let mut records = Vec::new();

        for line in output.lines() {
            let Some((pid_str, rest)) = split_token(line) else {
                continue;
            };
            let Some((ppid_str, rest)) = split_token(rest) else {
                continue;
            };

            let Ok(pid) = pid_str.parse::<u32>() else {
                continue;
            };
            let Ok(ppid) = ppid_str.parse::<u32>() else {
                continue;
            };

            let cmdline = rest.trim().to_string();
            let argv0 = cmdline.split_whitespace().next().unwrap_or_default();
            let name = argv0.rsplit('/').next().unwrap_or(argv0).to_string();
            let exe_path = if argv0.starts_with('/') {
                argv0.to_string()
            } else {
                String::new()
            };

            records.push(
                ProcessRecord::new(pid, name)
                    .with_cmdline(cmdline)
                    .with_exe_path(exe_path)
                    .with_parent(ppid),
            );
        }

        records
    }

    /// Parse `lsof -nP -iTCP:<port> -sTCP:LISTEN` output for an owner PID.
    ///
    /// Expected lsof output format:
    /// ```text
    /// COMMAND    PID  USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
    /// chrome   34805  code   19u  IPv6 0x3d8015e195af1f3f      0t0  TCP [::1]:9222 (LISTEN)
    /// ```
    fn parse_lsof_output(output: &str, port: u16) -> Option<u32> {
        // Skip header line
        for line in output.lines().skip(1) {
            let components: Vec<&str> = line.split_whitespace().collect();
            if components.len() < 9 {
                continue;
            }

            let Some(local_port) = utils::parse_port(components[8]) else {
                continue;
            };
            if local_port != port {
                continue;
            }

            if let Ok(pid) = components[1].parse() {
                return Some(pid);
            }
        }

        None
    }
}

impl Default for DarwinAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for DarwinAdapter {
    async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        let output = run_tool(
            Command::new("/bin/ps")
                .args(["-axo", "pid=,ppid=,args="])
                .stdout(Stdio::piped())
                .stderr(Stdio::null()),
            "ps",
        )
        .await?;

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in ps output: {}", e)))?;

        let records = Self::parse_ps_output(&stdout);
        debug!(count = records.len(), "process table scanned");
        Ok(records)
    }

    async fn terminate(&self, pid: u32, force: bool) -> Result<bool> {
        posix::send_signal(pid, force)
    }

    async fn resolve_port_owner(&self, port: u16) -> Result<Option<u32>> {
        let output = run_tool(
            Command::new("lsof")
                .args(["-nP", &format!("-iTCP:{}", port), "-sTCP:LISTEN"])
                .stdout(Stdio::piped())
                .stderr(Stdio::null()),
            "lsof",
        )
        .await?;

        // lsof exits non-zero when nothing matches; that is just "no owner".
        if output.stdout.is_empty() {
            return Ok(None);
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in lsof output: {}", e)))?;

        Ok(Self::parse_lsof_output(&stdout, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ps_output() {
        let output = "    1     0 /sbin/launchd\n  345     1 /opt/chromedriver --port=9515\n  402   345 /Applications/Chromium.app/Contents/MacOS/Chromium --headless\n";
        let records = DarwinAdapter::parse_ps_output(output);

        assert_eq!(records.len(), 3);
        assert_eq!(records[1].pid, 345);
        assert_eq!(records[1].parent_pid, Some(1));
        assert_eq!(records[1].name, "chromedriver");
        assert_eq!(records[1].exe_path, "/opt/chromedriver");
        assert_eq!(records[2].name, "Chromium");
        assert_eq!(records[2].parent_pid, Some(345));
    }

    #[test]
    fn test_parse_ps_output_skips_garbage() {
        let output = "not a pid line\n  12 badppid foo\n";
        assert!(DarwinAdapter::parse_ps_output(output).is_empty());
    }

    #[test]
    fn test_parse_lsof_output() {
        let output = "COMMAND    PID  USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME\nchrome   34805  code   19u  IPv6 0x3d8015e195af1f3f      0t0  TCP [::1]:9222 (LISTEN)\n";
        assert_eq!(DarwinAdapter::parse_lsof_output(output, 9222), Some(34805));
        assert_eq!(DarwinAdapter::parse_lsof_output(output, 9515), None);
    }
}
