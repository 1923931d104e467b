//! In-memory platform adapter for exercising the engine in tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::ProcessRecord;
use crate::platform::PlatformAdapter;

/// One synthetic process with configurable termination behavior.
pub(crate) struct FakeProcess {
    record: ProcessRecord,
    survives_soft: bool,
    protected: bool,
    vanishes: bool,
    port: Option<u16>,
}

impl FakeProcess {
    pub fn new(pid: u32, name: &str) -> Self {
        Self {
            record: ProcessRecord::new(pid, name),
            survives_soft: false,
            protected: false,
            vanishes: false,
            port: None,
        }
    }

    /// Ignore soft termination; only a forceful kill removes it.
    pub fn survives_soft(mut self) -> Self {
        self.survives_soft = true;
        self
    }

    /// Every termination attempt is rejected with PermissionDenied.
    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    /// Exits on its own the moment anyone tries to act on it.
    pub fn vanishes(mut self) -> Self {
        self.vanishes = true;
        self
    }

    /// Listen on a TCP port.
    pub fn on_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_cmdline(mut self, cmdline: &str) -> Self {
        self.record.cmdline = cmdline.to_string();
        self
    }

    pub fn with_parent(mut self, ppid: u32) -> Self {
        self.record.parent_pid = Some(ppid);
        self
    }
}

/// Fake adapter over a mutable in-memory process table.
pub(crate) struct FakeAdapter {
    table: Mutex<BTreeMap<u32, FakeProcess>>,
    kills: Mutex<Vec<(u32, bool)>>,
    soft_kill_unavailable: AtomicBool,
    enumeration_unavailable: AtomicBool,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(BTreeMap::new()),
            kills: Mutex::new(Vec::new()),
            soft_kill_unavailable: AtomicBool::new(false),
            enumeration_unavailable: AtomicBool::new(false),
        }
    }

    pub fn add(&self, process: FakeProcess) {
        self.table.lock().unwrap().insert(process.record.pid, process);
    }

    /// Remove every process, as a cooperative driver shutdown would.
    pub fn clear(&self) {
        self.table.lock().unwrap().clear();
    }

    /// Simulate a host without a soft-termination capability.
    pub fn disable_soft_kill(&self) {
        self.soft_kill_unavailable.store(true, Ordering::SeqCst);
    }

    /// Simulate a host without process enumeration.
    pub fn disable_enumeration(&self) {
        self.enumeration_unavailable.store(true, Ordering::SeqCst);
    }

    /// Successful termination calls, in delivery order.
    pub fn kills(&self) -> Vec<(u32, bool)> {
        self.kills.lock().unwrap().clone()
    }

    pub fn alive(&self, pid: u32) -> bool {
        self.table.lock().unwrap().contains_key(&pid)
    }
}

impl PlatformAdapter for FakeAdapter {
    async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        if self.enumeration_unavailable.load(Ordering::SeqCst) {
            return Err(Error::ToolUnavailable("fake enumeration".to_string()));
        }

        Ok(self
            .table
            .lock()
            .unwrap()
            .values()
            .map(|p| p.record.clone())
            .collect())
    }

    async fn terminate(&self, pid: u32, force: bool) -> Result<bool> {
        if !force && self.soft_kill_unavailable.load(Ordering::SeqCst) {
            return Err(Error::ToolUnavailable("fake soft kill".to_string()));
        }

        let mut table = self.table.lock().unwrap();
        let Some(process) = table.get(&pid) else {
            // Already gone: idempotent success.
            return Ok(true);
        };

        if process.vanishes {
            table.remove(&pid);
            return Err(Error::ProcessVanished(pid));
        }

        if process.protected {
            return Err(Error::PermissionDenied(pid));
        }

        self.kills.lock().unwrap().push((pid, force));

        if force || !process.survives_soft {
            table.remove(&pid);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn resolve_port_owner(&self, port: u16) -> Result<Option<u32>> {
        Ok(self
            .table
            .lock()
            .unwrap()
            .values()
            .find(|p| p.port == Some(port))
            .map(|p| p.record.pid))
    }
}
