//! Platform capability interface for process control.
//!
//! One adapter variant is selected at compile time per target OS:
//! - Linux: `/proc` enumeration, POSIX signals, `ss` port resolution
//! - macOS: `ps` enumeration, POSIX signals, `lsof` port resolution
//! - Windows: `wmic`/`tasklist` enumeration, `taskkill`, `netstat`
//!
//! Every variant treats "target not found" as a non-error so that
//! termination stays idempotent under enumeration races.

#[cfg(target_os = "macos")]
mod darwin;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(unix)]
mod posix;

#[cfg(target_os = "windows")]
mod windows;

mod utils;

use std::future::Future;

use tokio::process::Command;

use crate::error::{Error, Result};
use crate::models::ProcessRecord;

/// Capability interface over OS process control.
///
/// Implementations handle enumeration, signal/termination delivery, and
/// port-to-owner resolution for one platform.
pub trait PlatformAdapter: Send + Sync {
    /// Snapshot the process table.
    ///
    /// Processes that cannot be read (permission, exit races) are simply
    /// absent from the result; only a missing enumeration capability is an
    /// error.
    fn list_processes(&self) -> impl Future<Output = Result<Vec<ProcessRecord>>> + Send;

    /// Request termination of one process.
    ///
    /// Soft termination asks the process to shut down; `force` terminates
    /// it immediately. Returns `Ok(true)` when the request was delivered
    /// or the process was already gone, `Ok(false)` when delivery could
    /// not be confirmed.
    fn terminate(&self, pid: u32, force: bool) -> impl Future<Output = Result<bool>> + Send;

    /// Resolve a TCP port to the PID listening on it, if any.
    fn resolve_port_owner(&self, port: u16) -> impl Future<Output = Result<Option<u32>>> + Send;
}

/// Shared adapters delegate through the smart pointer.
impl<P: PlatformAdapter> PlatformAdapter for std::sync::Arc<P> {
    async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        (**self).list_processes().await
    }

    async fn terminate(&self, pid: u32, force: bool) -> Result<bool> {
        (**self).terminate(pid, force).await
    }

    async fn resolve_port_owner(&self, port: u16) -> Result<Option<u32>> {
        (**self).resolve_port_owner(port).await
    }
}

/// Run an external tool, classifying a missing binary as
/// [`Error::ToolUnavailable`] so the caller can skip the stage that
/// needed it.
pub(crate) async fn run_tool(cmd: &mut Command, tool: &str) -> Result<std::process::Output> {
    cmd.output().await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::ToolUnavailable(tool.to_string()),
        _ => Error::Io(e),
    })
}

/// The platform adapter for the compile target, selected once at startup.
pub struct SystemPlatform {
    #[cfg(target_os = "linux")]
    inner: linux::LinuxAdapter,

    #[cfg(target_os = "macos")]
    inner: darwin::DarwinAdapter,

    #[cfg(target_os = "windows")]
    inner: windows::WindowsAdapter,
}

// Fallback for unsupported platforms (compile-time check)
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
compile_error!("Unsupported platform: only Linux, macOS and Windows are supported");

impl SystemPlatform {
    /// Create the adapter for the current platform.
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "linux")]
            inner: linux::LinuxAdapter::new(),

            #[cfg(target_os = "macos")]
            inner: darwin::DarwinAdapter::new(),

            #[cfg(target_os = "windows")]
            inner: windows::WindowsAdapter::new(),
        }
    }
}

impl Default for SystemPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for SystemPlatform {
    async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        self.inner.list_processes().await
    }

    async fn terminate(&self, pid: u32, force: bool) -> Result<bool> {
        self.inner.terminate(pid, force).await
    }

    async fn resolve_port_owner(&self, port: u16) -> Result<Option<u32>> {
        self.inner.resolve_port_owner(port).await
    }
}
