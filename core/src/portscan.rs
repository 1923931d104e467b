//! Port-to-owner resolution, the catch-all that name and command-line
//! heuristics cannot provide.
//!
//! A process launched through enough indirection can evade every textual
//! heuristic, but it cannot hide the control port it listens on. Bindings
//! are recomputed on every sweep and never cached across stages.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PortRange;
use crate::error::{Error, Result};
use crate::platform::PlatformAdapter;

/// Transient port→owner mapping from one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub port: u16,
    pub pid: u32,
}

/// Resolves tracked ports to their owning processes.
pub struct PortScanner {
    targets: Vec<u16>,
}

impl PortScanner {
    /// Build a scanner over the fixed tracked ports plus an optional
    /// configured range. Duplicates are collapsed.
    pub fn new(tracked: &[u16], range: Option<&PortRange>) -> Self {
        let mut targets: BTreeSet<u16> = tracked.iter().copied().collect();
        if let Some(range) = range {
            targets.extend(range.iter());
        }
        Self {
            targets: targets.into_iter().collect(),
        }
    }

    /// The ports this scanner covers, sorted.
    pub fn targets(&self) -> &[u16] {
        &self.targets
    }

    /// Resolve a single port to its owner, if any.
    pub async fn resolve<P: PlatformAdapter>(
        &self,
        platform: &P,
        port: u16,
    ) -> Result<Option<u32>> {
        platform.resolve_port_owner(port).await
    }

    /// Resolve every target port.
    ///
    /// Per-port failures are logged and skipped; a missing resolution tool
    /// aborts the sweep so the caller can skip the stage.
    pub async fn sweep<P: PlatformAdapter>(&self, platform: &P) -> Result<Vec<PortBinding>> {
        let mut bindings = Vec::new();

        for &port in &self.targets {
            match platform.resolve_port_owner(port).await {
                Ok(Some(pid)) => {
                    debug!(port = port, pid = pid, "port owner resolved");
                    bindings.push(PortBinding { port, pid });
                }
                Ok(None) => {}
                Err(Error::ToolUnavailable(tool)) => {
                    return Err(Error::ToolUnavailable(tool));
                }
                Err(e) => {
                    warn!(port = port, error = %e, "port resolution failed");
                }
            }
        }

        Ok(bindings)
    }
}
