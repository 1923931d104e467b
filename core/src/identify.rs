//! Heuristic identification of browser-automation processes.
//!
//! A process belongs to the cleanup scope if any single criterion matches:
//! name or executable path containing a tracked substring, or command line
//! containing one of the tracked automation flags. Matching is
//! case-insensitive throughout.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::{MatchReason, ProcessRecord};
use crate::platform::PlatformAdapter;

fn default_name_substrings() -> Vec<String> {
    ["chrome", "chromium", "chromedriver"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cmdline_markers() -> Vec<String> {
    [
        "--user-data-dir=",
        "--remote-debugging-port=",
        "--type=",
        "--test-type=",
        "headless",
        "no-sandbox",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Heuristic matching rules applied over an enumerated process table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchCriteria {
    /// Substrings matched against process name and executable path.
    #[serde(rename = "nameSubstrings")]
    pub name_substrings: Vec<String>,

    /// Substrings matched against the full command line.
    #[serde(rename = "cmdlineMarkers")]
    pub cmdline_markers: Vec<String>,
}

impl Default for MatchCriteria {
    fn default() -> Self {
        Self {
            name_substrings: default_name_substrings(),
            cmdline_markers: default_cmdline_markers(),
        }
    }
}

impl MatchCriteria {
    /// Test one record against the criteria.
    ///
    /// Returns the first reason that matched, checking name, then
    /// executable path, then command line.
    pub fn matches(&self, record: &ProcessRecord) -> Option<MatchReason> {
        let name = record.name.to_lowercase();
        let exe = record.exe_path.to_lowercase();
        let cmdline = record.cmdline.to_lowercase();

        for needle in &self.name_substrings {
            let needle = needle.to_lowercase();
            if name.contains(&needle) {
                return Some(MatchReason::Name);
            }
            if !exe.is_empty() && exe.contains(&needle) {
                return Some(MatchReason::ExecutablePath);
            }
        }

        for marker in &self.cmdline_markers {
            if cmdline.contains(&marker.to_lowercase()) {
                return Some(MatchReason::CommandLine);
            }
        }

        None
    }
}

/// Applies [`MatchCriteria`] over platform enumeration to produce
/// candidate sets.
pub struct ProcessIdentifier {
    criteria: MatchCriteria,
}

impl ProcessIdentifier {
    /// Create an identifier over the given criteria.
    pub fn new(criteria: MatchCriteria) -> Self {
        Self { criteria }
    }

    /// The criteria this identifier scans with.
    pub fn criteria(&self) -> &MatchCriteria {
        &self.criteria
    }

    /// Enumerate all processes and return those matching the criteria,
    /// with [`ProcessRecord::matched`] filled in.
    ///
    /// Individual processes the platform could not read are already absent
    /// from the enumeration; their loss never aborts the scan.
    pub async fn scan<P: PlatformAdapter>(&self, platform: &P) -> Result<Vec<ProcessRecord>> {
        let snapshot = platform.list_processes().await?;

        let matches: Vec<ProcessRecord> = snapshot
            .into_iter()
            .filter_map(|mut record| {
                let reason = self.criteria.matches(&record)?;
                record.matched = Some(reason);
                Some(record)
            })
            .collect();

        debug!(count = matches.len(), "identification scan complete");
        Ok(matches)
    }
}

/// Pull the `--user-data-dir=<path>` value out of a command line, if any.
///
/// Used to register per-session browser profile directories for removal
/// at verification time.
pub fn extract_user_data_dir(cmdline: &str) -> Option<String> {
    // Unquoted paths end at the first whitespace, same as the launcher
    // would have parsed them.
    let re = Regex::new(r"--user-data-dir=([^\s]+)").ok()?;
    let caps = re.captures(cmdline)?;
    Some(caps[1].to_string())
}
