//! Data models for process records, groups, and cleanup reports.

mod process;
mod report;

pub use process::{MatchReason, ProcessGroup, ProcessRecord};
pub use report::{CleanupReport, Stage, StageRecord};
