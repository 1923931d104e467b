//! Cleanup stage and report types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProcessRecord;

/// One step in the fixed, strictly forward-moving escalation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Cooperative shutdown request issued to the driver.
    Graceful,
    /// Soft-signal termination of the resolved process tree, leaves first.
    TreeSoft,
    /// Forceful termination of the resolved process tree, leaves first.
    TreeHard,
    /// Termination of processes found by port ownership.
    PortBased,
    /// Heuristic-wide scan and terminate, the last-resort catch-all.
    SystemWide,
    /// Final rescan against the original criteria.
    Verify,
}

impl Stage {
    /// The escalating stages, in execution order. `Verify` always follows.
    pub const ESCALATION: [Stage; 5] = [
        Stage::Graceful,
        Stage::TreeSoft,
        Stage::TreeHard,
        Stage::PortBased,
        Stage::SystemWide,
    ];

    /// Position in the escalation order, used to assert monotonicity.
    pub fn order(self) -> u8 {
        match self {
            Self::Graceful => 0,
            Self::TreeSoft => 1,
            Self::TreeHard => 2,
            Self::PortBased => 3,
            Self::SystemWide => 4,
            Self::Verify => 5,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Graceful => write!(f, "graceful"),
            Self::TreeSoft => write!(f, "tree-soft"),
            Self::TreeHard => write!(f, "tree-hard"),
            Self::PortBased => write!(f, "port-based"),
            Self::SystemWide => write!(f, "system-wide"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

/// One executed stage and the residual count it left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage that ran.
    pub stage: Stage,
    /// Tracked processes still present after the stage completed.
    pub residual_after: usize,
}

/// Immutable output of one cleanup session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Identity of the session that produced this report.
    pub session_id: Uuid,

    /// Tracked PIDs confirmed gone by the end of the session.
    pub killed_pids: BTreeSet<u32>,

    /// Tracked PIDs still present at session end.
    pub residual_pids: BTreeSet<u32>,

    /// Snapshot records for the residual PIDs, when available.
    #[serde(default)]
    pub residual_processes: Vec<ProcessRecord>,

    /// Stages that actually executed, in order, with residual counts.
    pub stages_executed: Vec<StageRecord>,

    /// Total session duration in milliseconds.
    pub elapsed_ms: u64,

    /// True when the timeout budget ran out before verification.
    pub timed_out: bool,

    /// True only when the session verified an empty residual set in budget.
    ///
    /// Deliberately independent of the CLI exit code, which is always 0.
    pub success: bool,
}

impl CleanupReport {
    /// True when the recorded stages appear in strict escalation order.
    pub fn stages_monotonic(&self) -> bool {
        self.stages_executed
            .windows(2)
            .all(|w| w[0].stage.order() < w[1].stage.order())
    }
}
