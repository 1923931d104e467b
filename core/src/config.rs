//! Cleanup configuration and its on-disk store.
//!
//! Persisted defaults live in JSON format at `~/.chromesweep/config.json`.
//! Everything in [`CleanupConfig`] can also be supplied per call, so the
//! store only holds the operator's standing preferences.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::identify::MatchCriteria;

/// Chrome DevTools remote-debugging default port.
pub const DEVTOOLS_PORT: u16 = 9222;

/// ChromeDriver default control port.
pub const CHROMEDRIVER_PORT: u16 = 9515;

fn default_timeout_secs() -> u64 {
    10
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_graceful_wait_ms() -> u64 {
    1000
}

fn default_tracked_ports() -> Vec<u16> {
    vec![DEVTOOLS_PORT, CHROMEDRIVER_PORT]
}

/// An inclusive port range for the optional catch-all sweep.
///
/// Resolving a range is O(length) adapter calls, so the bound comes from
/// whoever configures it rather than a hard-coded ephemeral-range scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// Iterate the ports in the range. An inverted range yields nothing.
    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }

    /// Number of ports covered.
    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            usize::from(self.end - self.start) + 1
        }
    }

    /// True when the range covers no ports.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parameters of one cleanup session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Heuristic matching rules for identification and verification.
    pub criteria: MatchCriteria,

    /// Global timeout budget for the whole session, in seconds.
    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: u64,

    /// Wait between a stage's actions and its residual re-snapshot.
    #[serde(rename = "backoffMs")]
    pub backoff_ms: u64,

    /// Fixed wait after the driver's cooperative shutdown request.
    #[serde(rename = "gracefulWaitMs")]
    pub graceful_wait_ms: u64,

    /// Control ports whose owners belong to the session.
    #[serde(rename = "trackedPorts")]
    pub tracked_ports: Vec<u16>,

    /// Optional extra port range to sweep during the port-based stage.
    #[serde(rename = "scanRange", skip_serializing_if = "Option::is_none")]
    pub scan_range: Option<PortRange>,

    /// Working directories to remove at verification time.
    #[serde(rename = "dataDirs")]
    pub data_dirs: Vec<PathBuf>,

    /// Known root PIDs (the driver process) registered by the caller.
    #[serde(rename = "rootPids")]
    pub root_pids: Vec<u32>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            criteria: MatchCriteria::default(),
            timeout_secs: default_timeout_secs(),
            backoff_ms: default_backoff_ms(),
            graceful_wait_ms: default_graceful_wait_ms(),
            tracked_ports: default_tracked_ports(),
            scan_range: None,
            data_dirs: Vec::new(),
            root_pids: Vec::new(),
        }
    }
}

impl CleanupConfig {
    /// The session's total timeout budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The inter-stage backoff interval.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// The wait after a cooperative shutdown request.
    pub fn graceful_wait(&self) -> Duration {
        Duration::from_millis(self.graceful_wait_ms)
    }
}

/// Configuration store for persisted cleanup defaults.
///
/// Handles reading and writing `~/.chromesweep/config.json`.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.chromesweep/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        let config_path = home.join(".chromesweep").join("config.json");
        Ok(Self { config_path })
    }

    /// Create a config store with a custom path (for testing).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<CleanupConfig> {
        if !self.config_path.exists() {
            return Ok(CleanupConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist. The write goes to
    /// a temp file first and is renamed into place.
    pub async fn save(&self, config: &CleanupConfig) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir).await.map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(config)?;

        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }
}
