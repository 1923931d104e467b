//! Process snapshot types.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Why a process was pulled into a cleanup session's tracked group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    /// Process name contained a tracked substring.
    Name,
    /// Executable path contained a tracked substring.
    ExecutablePath,
    /// Command line contained a tracked flag.
    CommandLine,
    /// Process was listening on a tracked port.
    PortOwner,
    /// Process was found as a descendant of a tracked process.
    Descendant,
    /// Process was registered as a root by the caller.
    Registered,
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::ExecutablePath => write!(f, "exe"),
            Self::CommandLine => write!(f, "cmdline"),
            Self::PortOwner => write!(f, "port"),
            Self::Descendant => write!(f, "child"),
            Self::Registered => write!(f, "registered"),
        }
    }
}

/// Immutable snapshot of one process at one point in time.
///
/// A record is a point-in-time view: the process may be gone by the time
/// anyone acts on it, and that is expected rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Process ID.
    pub pid: u32,

    /// Process name (executable basename).
    pub name: String,

    /// Full path to the executable, empty when unknown.
    #[serde(default)]
    pub exe_path: String,

    /// Full command line that started the process, empty when unknown.
    #[serde(default)]
    pub cmdline: String,

    /// Parent process ID, if known.
    #[serde(default)]
    pub parent_pid: Option<u32>,

    /// Why this record matched, set by the identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchReason>,
}

impl ProcessRecord {
    /// Create a bare record as produced by platform enumeration.
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            exe_path: String::new(),
            cmdline: String::new(),
            parent_pid: None,
            matched: None,
        }
    }

    /// Builder-style command line.
    pub fn with_cmdline(mut self, cmdline: impl Into<String>) -> Self {
        self.cmdline = cmdline.into();
        self
    }

    /// Builder-style executable path.
    pub fn with_exe_path(mut self, exe_path: impl Into<String>) -> Self {
        self.exe_path = exe_path.into();
        self
    }

    /// Builder-style parent PID.
    pub fn with_parent(mut self, ppid: u32) -> Self {
        self.parent_pid = Some(ppid);
        self
    }
}

impl std::fmt::Display for ProcessRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cmdline.is_empty() {
            write!(f, "{} {}", self.pid, self.name)
        } else {
            write!(f, "{} {} ({})", self.pid, self.name, self.cmdline)
        }
    }
}

/// The set of processes considered owned by one cleanup session.
///
/// Membership is established at session start and may only grow (tree and
/// port discovery) or shrink (confirmed termination). The first reason a
/// PID was added is kept; later re-discoveries do not overwrite it.
#[derive(Debug, Clone, Default)]
pub struct ProcessGroup {
    members: BTreeMap<u32, MatchReason>,
}

impl ProcessGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a PID with the reason it was discovered.
    ///
    /// Returns true if the PID was not previously tracked.
    pub fn insert(&mut self, pid: u32, reason: MatchReason) -> bool {
        if self.members.contains_key(&pid) {
            return false;
        }
        self.members.insert(pid, reason);
        true
    }

    /// Check whether a PID is tracked.
    pub fn contains(&self, pid: u32) -> bool {
        self.members.contains_key(&pid)
    }

    /// The reason a PID was tracked, if it is.
    pub fn reason(&self, pid: u32) -> Option<MatchReason> {
        self.members.get(&pid).copied()
    }

    /// All tracked PIDs, sorted.
    pub fn pids(&self) -> BTreeSet<u32> {
        self.members.keys().copied().collect()
    }

    /// Number of tracked PIDs.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when no PIDs are tracked.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_display() {
        let rec = ProcessRecord::new(42, "chrome");
        assert_eq!(rec.to_string(), "42 chrome");

        let rec = rec.with_cmdline("/opt/chrome --headless");
        assert_eq!(rec.to_string(), "42 chrome (/opt/chrome --headless)");
    }

    #[test]
    fn test_group_first_reason_wins() {
        let mut group = ProcessGroup::new();
        assert!(group.insert(10, MatchReason::Name));
        assert!(!group.insert(10, MatchReason::PortOwner));
        assert_eq!(group.reason(10), Some(MatchReason::Name));
    }

    #[test]
    fn test_group_pids_sorted() {
        let mut group = ProcessGroup::new();
        group.insert(30, MatchReason::Descendant);
        group.insert(10, MatchReason::Name);
        group.insert(20, MatchReason::PortOwner);

        let pids: Vec<u32> = group.pids().into_iter().collect();
        assert_eq!(pids, vec![10, 20, 30]);
        assert_eq!(group.len(), 3);
    }
}
