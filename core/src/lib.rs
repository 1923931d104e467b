//! Chromesweep Core Library
//!
//! Staged termination engine for process groups spawned by a
//! browser-automation driver. Provides functionality to:
//! - Identify browser processes by name, executable path, and
//!   command-line heuristics
//! - Expand tracked roots into full descendant sets, leaves first
//! - Escalate through ordered cleanup stages under a timeout budget
//! - Catch port-bound processes that evade every textual heuristic
//! - Verify convergence and report killed and residual PIDs
//!
//! # Architecture
//! - `models`: Process snapshots, groups, and the cleanup report
//! - `identify`: Heuristic matching over the enumerated process table
//! - `tree`: Parent→child resolution from one snapshot
//! - `portscan`: Port-to-owner resolution
//! - `platform`: Per-OS process control behind one capability trait
//! - `session`: The escalation controller and session state
//! - `verify`: Final rescan and working-directory removal
//! - `config`: Session parameters and their on-disk store
//!
//! # Platform Support
//! - Linux: `/proc` enumeration, POSIX signals, `ss` port lookup
//! - macOS: `ps` enumeration, POSIX signals, `lsof` port lookup
//! - Windows: `wmic`/`tasklist` enumeration, `taskkill`, `netstat`

pub mod config;
pub mod error;
pub mod identify;
pub mod models;
pub mod platform;
pub mod portscan;
pub mod session;
pub mod tree;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

// Re-export the primary API
pub use config::{CleanupConfig, ConfigStore, PortRange};
pub use error::{Error, Result};
pub use identify::{MatchCriteria, ProcessIdentifier};
pub use models::{CleanupReport, MatchReason, ProcessGroup, ProcessRecord, Stage, StageRecord};
pub use platform::{PlatformAdapter, SystemPlatform};
pub use portscan::{PortBinding, PortScanner};
pub use session::{run_cleanup, DriverShutdown, EscalationController, NoDriver};
pub use tree::ProcessTreeResolver;
