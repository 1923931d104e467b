//! The escalation controller: orchestrates the ordered cleanup stages.
//!
//! A session walks the fixed sequence
//! `Graceful → TreeSoft → TreeHard → PortBased → SystemWide → Verify`,
//! advancing only while tracked processes remain and the timeout budget
//! holds. Stages never regress and are never retried; anything a stage
//! fails to kill is left for the next, more forceful one.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CleanupConfig;
use crate::error::{Error, Result};
use crate::identify::{extract_user_data_dir, ProcessIdentifier};
use crate::models::{CleanupReport, MatchReason, ProcessGroup, ProcessRecord, Stage, StageRecord};
use crate::platform::{PlatformAdapter, SystemPlatform};
use crate::portscan::PortScanner;
use crate::tree::ProcessTreeResolver;
use crate::verify;

/// Cooperative shutdown handle for the driver process, consumed by the
/// Graceful stage. Best-effort: the handle may be absent, and a failed
/// request just moves the session on to forceful stages.
pub trait DriverShutdown: Send + Sync {
    /// Ask the driver to shut itself down cooperatively.
    fn attempt_graceful_shutdown(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Placeholder driver type for sessions without a shutdown handle.
pub struct NoDriver;

impl DriverShutdown for NoDriver {
    async fn attempt_graceful_shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// One cleanup session: the tracked group, its timeout budget, and the
/// stage history. Created per call, destroyed on report.
struct CleanupSession {
    id: Uuid,
    config: CleanupConfig,
    started: Instant,
    group: ProcessGroup,
    data_dirs: Vec<PathBuf>,
    history: Vec<StageRecord>,
}

impl CleanupSession {
    fn new(config: CleanupConfig) -> Self {
        let data_dirs = config.data_dirs.clone();
        Self {
            id: Uuid::new_v4(),
            config,
            started: Instant::now(),
            group: ProcessGroup::new(),
            data_dirs,
            history: Vec::new(),
        }
    }

    /// Track a PID in the session's group.
    ///
    /// The sweeper's own process name contains "chrome", so it matches its
    /// own heuristics; it must never become a kill target.
    fn track(&mut self, pid: u32, reason: MatchReason) -> bool {
        if pid == std::process::id() {
            return false;
        }
        self.group.insert(pid, reason);
        true
    }

    fn register_data_dir(&mut self, dir: PathBuf) {
        if !self.data_dirs.contains(&dir) {
            self.data_dirs.push(dir);
        }
    }

    fn budget_exhausted(&self) -> bool {
        self.started.elapsed() >= self.config.timeout()
    }

    fn record_stage(&mut self, stage: Stage, residual_after: usize) {
        self.history.push(StageRecord { stage, residual_after });
    }

    fn into_report(
        self,
        residual: BTreeSet<u32>,
        residual_processes: Vec<ProcessRecord>,
        timed_out: bool,
    ) -> CleanupReport {
        let tracked = self.group.pids();
        let killed: BTreeSet<u32> = tracked.difference(&residual).copied().collect();
        let success = !timed_out && residual.is_empty();

        CleanupReport {
            session_id: self.id,
            killed_pids: killed,
            residual_pids: residual,
            residual_processes,
            stages_executed: self.history,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            timed_out,
            success,
        }
    }
}

/// Drives identification, tree resolution, and the platform adapter
/// through the escalating cleanup stages.
pub struct EscalationController<P> {
    platform: P,
}

impl<P: PlatformAdapter> EscalationController<P> {
    /// Create a controller over a platform adapter.
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    /// The adapter this controller acts through.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Run one cleanup session without a driver handle.
    pub async fn run(&self, config: CleanupConfig) -> CleanupReport {
        self.run_with_driver(config, Option::<&NoDriver>::None).await
    }

    /// Run one cleanup session, with a cooperative shutdown handle for
    /// the Graceful stage when available.
    ///
    /// Never fails: every error degrades into the report. The report's
    /// `success` field is the one source of truth for the outcome.
    pub async fn run_with_driver<D: DriverShutdown>(
        &self,
        config: CleanupConfig,
        driver: Option<&D>,
    ) -> CleanupReport {
        let mut session = CleanupSession::new(config);
        let identifier = ProcessIdentifier::new(session.config.criteria.clone());
        let scanner = PortScanner::new(
            &session.config.tracked_ports,
            session.config.scan_range.as_ref(),
        );

        self.establish_group(&mut session, &identifier, &scanner).await;

        let mut residual = match self.live_tracked(&session).await {
            Some(live) => live,
            None => session.group.pids(),
        };
        let mut timed_out = false;

        for stage in Stage::ESCALATION {
            if residual.is_empty() {
                debug!(session = %session.id, "residual set empty, remaining stages skipped");
                break;
            }
            if session.budget_exhausted() {
                warn!(session = %session.id, stage = %stage, "timeout budget exhausted");
                timed_out = true;
                break;
            }

            let executed = match stage {
                Stage::Graceful => self.stage_graceful(&session, driver).await,
                Stage::TreeSoft => self.stage_tree(&mut session, &residual, false).await,
                Stage::TreeHard => self.stage_tree(&mut session, &residual, true).await,
                Stage::PortBased => self.stage_port_based(&mut session, &scanner).await,
                Stage::SystemWide => self.stage_system_wide(&mut session, &identifier).await,
                Stage::Verify => unreachable!("verify runs after the escalation loop"),
            };

            if let Some(live) = self.live_tracked(&session).await {
                residual = live;
            }
            if executed {
                session.record_stage(stage, residual.len());
            }
        }

        let mut residual_processes = Vec::new();
        if !timed_out {
            if session.budget_exhausted() {
                timed_out = true;
            } else {
                match verify::verify_residual(&self.platform, &identifier, &session.group).await {
                    Ok(records) => {
                        residual = records.iter().map(|r| r.pid).collect();
                        residual_processes = records;
                        session.record_stage(Stage::Verify, residual.len());
                    }
                    Err(e) => warn!(error = %e, "verification rescan failed"),
                }
            }
        }

        // Directory cleanup is order-independent of the process stages and
        // runs even when the session timed out.
        verify::remove_data_dirs(&session.data_dirs).await;

        session.into_report(residual, residual_processes, timed_out)
    }

    /// Establish group ownership at session start: registered roots,
    /// heuristic matches, and current owners of tracked ports.
    async fn establish_group(
        &self,
        session: &mut CleanupSession,
        identifier: &ProcessIdentifier,
        scanner: &PortScanner,
    ) {
        let roots = session.config.root_pids.clone();
        for pid in roots {
            session.track(pid, MatchReason::Registered);
        }

        match identifier.scan(&self.platform).await {
            Ok(matches) => {
                for record in &matches {
                    session.track(record.pid, record.matched.unwrap_or(MatchReason::Name));
                    if let Some(dir) = extract_user_data_dir(&record.cmdline) {
                        session.register_data_dir(PathBuf::from(dir));
                    }
                }
            }
            Err(e) => warn!(error = %e, "initial identification scan failed"),
        }

        match scanner.sweep(&self.platform).await {
            Ok(bindings) => {
                for binding in bindings {
                    session.track(binding.pid, MatchReason::PortOwner);
                }
            }
            Err(e) => debug!(error = %e, "initial port sweep failed"),
        }

        debug!(
            session = %session.id,
            tracked = session.group.len(),
            "process group established"
        );
    }

    /// Tracked PIDs still present in the process table. `None` when the
    /// table cannot be read, leaving the caller's last view in place.
    async fn live_tracked(&self, session: &CleanupSession) -> Option<BTreeSet<u32>> {
        match self.platform.list_processes().await {
            Ok(snapshot) => {
                let live: HashSet<u32> = snapshot.iter().map(|r| r.pid).collect();
                Some(
                    session
                        .group
                        .pids()
                        .into_iter()
                        .filter(|pid| live.contains(pid))
                        .collect(),
                )
            }
            Err(e) => {
                warn!(error = %e, "residual snapshot failed");
                None
            }
        }
    }

    /// Terminate each target, degrading individual failures.
    ///
    /// Returns false when the termination capability itself is missing,
    /// so the caller can mark the stage skipped.
    async fn terminate_all(&self, targets: &[u32], force: bool) -> bool {
        for &pid in targets {
            match self.platform.terminate(pid, force).await {
                Ok(_) => {}
                Err(Error::ProcessVanished(pid)) => {
                    debug!(pid = pid, "target vanished before termination");
                }
                Err(Error::PermissionDenied(pid)) => {
                    warn!(pid = pid, "permission denied, left for a later stage");
                }
                Err(Error::ToolUnavailable(tool)) => {
                    warn!(tool = %tool, "termination capability unavailable, stage skipped");
                    return false;
                }
                Err(e) => warn!(pid = pid, error = %e, "termination failed"),
            }
        }
        true
    }

    /// Graceful: ask the driver to shut down, then wait briefly.
    async fn stage_graceful<D: DriverShutdown>(
        &self,
        session: &CleanupSession,
        driver: Option<&D>,
    ) -> bool {
        let Some(driver) = driver else {
            debug!("no driver handle registered, graceful stage skipped");
            return false;
        };

        if let Err(e) = driver.attempt_graceful_shutdown().await {
            warn!(error = %e, "graceful shutdown request failed");
        }
        sleep(session.config.graceful_wait()).await;
        true
    }

    /// TreeTerminate: resolve the descendant set of every residual PID
    /// from a fresh snapshot and terminate it leaves-first.
    async fn stage_tree(
        &self,
        session: &mut CleanupSession,
        residual: &BTreeSet<u32>,
        force: bool,
    ) -> bool {
        let snapshot = match self.platform.list_processes().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "enumeration failed, tree stage skipped");
                return false;
            }
        };

        let resolver = ProcessTreeResolver::from_snapshot(&snapshot);
        let roots: Vec<u32> = residual.iter().copied().collect();

        let mut targets = Vec::new();
        for pid in resolver.expand(&roots) {
            if session.track(pid, MatchReason::Descendant) {
                targets.push(pid);
            }
        }

        if !self.terminate_all(&targets, force).await {
            return false;
        }
        sleep(session.config.backoff()).await;
        true
    }

    /// PortBased: re-sweep the tracked ports and terminate the owners.
    async fn stage_port_based(
        &self,
        session: &mut CleanupSession,
        scanner: &PortScanner,
    ) -> bool {
        let bindings = match scanner.sweep(&self.platform).await {
            Ok(bindings) => bindings,
            Err(e) => {
                warn!(error = %e, "port resolution unavailable, port stage skipped");
                return false;
            }
        };

        let mut targets = Vec::new();
        for binding in bindings {
            if session.track(binding.pid, MatchReason::PortOwner) {
                targets.push(binding.pid);
            }
        }

        if !self.terminate_all(&targets, true).await {
            return false;
        }
        sleep(session.config.backoff()).await;
        true
    }

    /// SystemWide: heuristic scan with no root restriction, the last
    /// resort before verification.
    async fn stage_system_wide(
        &self,
        session: &mut CleanupSession,
        identifier: &ProcessIdentifier,
    ) -> bool {
        let matches = match identifier.scan(&self.platform).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "enumeration failed, system-wide stage skipped");
                return false;
            }
        };

        let mut targets = Vec::new();
        for record in matches {
            let reason = record.matched.unwrap_or(MatchReason::Name);
            if session.track(record.pid, reason) {
                targets.push(record.pid);
            }
        }

        if !self.terminate_all(&targets, true).await {
            return false;
        }
        sleep(session.config.backoff()).await;
        true
    }
}

/// Run one cleanup session on the current platform without a driver
/// handle. This is the library's main entry point.
pub async fn run_cleanup(config: CleanupConfig) -> CleanupReport {
    EscalationController::new(SystemPlatform::new()).run(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAdapter, FakeProcess};

    fn test_config() -> CleanupConfig {
        CleanupConfig {
            timeout_secs: 5,
            backoff_ms: 1,
            graceful_wait_ms: 1,
            ..CleanupConfig::default()
        }
    }

    #[tokio::test]
    async fn test_convergence_three_matching_processes() {
        let fake = FakeAdapter::new();
        fake.add(FakeProcess::new(101, "chrome-worker"));
        fake.add(FakeProcess::new(102, "chrome-worker").survives_soft());
        fake.add(FakeProcess::new(103, "chromedriver"));

        let controller = EscalationController::new(fake);
        let report = controller.run(test_config()).await;

        assert!(report.success);
        assert!(report.residual_pids.is_empty());
        assert_eq!(
            report.killed_pids,
            [101, 102, 103].into_iter().collect()
        );

        let stages: Vec<Stage> = report.stages_executed.iter().map(|r| r.stage).collect();
        assert!(stages.contains(&Stage::TreeSoft));
        assert!(stages.contains(&Stage::TreeHard));
        assert!(report.stages_monotonic());
    }

    #[tokio::test]
    async fn test_children_terminated_before_parents() {
        let fake = FakeAdapter::new();
        fake.add(FakeProcess::new(200, "chromedriver"));
        fake.add(FakeProcess::new(201, "chrome").with_parent(200));
        fake.add(FakeProcess::new(202, "nacl_helper").with_parent(201));

        let controller = EscalationController::new(fake);
        let report = controller.run(test_config()).await;
        assert!(report.success);

        let kills = controller.platform().kills();
        let pos = |pid: u32| kills.iter().position(|&(p, _)| p == pid).unwrap();
        assert!(pos(202) < pos(201));
        assert!(pos(201) < pos(200));
    }

    #[tokio::test]
    async fn test_race_tolerance_vanished_process() {
        let fake = FakeAdapter::new();
        fake.add(FakeProcess::new(300, "chrome").vanishes());

        let controller = EscalationController::new(fake);
        let report = controller.run(test_config()).await;

        assert!(report.success);
        assert!(report.residual_pids.is_empty());
        assert!(report.killed_pids.contains(&300));
    }

    #[tokio::test]
    async fn test_port_catch_all() {
        // Bound to a tracked port, but nothing in the name or command
        // line matches the heuristics.
        let fake = FakeAdapter::new();
        fake.add(
            FakeProcess::new(400, "inconspicuous")
                .with_cmdline("/usr/bin/inconspicuous --serve")
                .on_port(9222),
        );

        let controller = EscalationController::new(fake);
        let report = controller.run(test_config()).await;

        assert!(report.success);
        assert!(report.killed_pids.contains(&400));
        assert!(report.residual_pids.is_empty());
    }

    #[tokio::test]
    async fn test_graceful_degradation_soft_kill_unavailable() {
        let fake = FakeAdapter::new();
        fake.add(FakeProcess::new(500, "chrome"));
        fake.disable_soft_kill();

        let controller = EscalationController::new(fake);
        let report = controller.run(test_config()).await;

        // TreeSoft is skipped, TreeHard still runs and converges.
        assert!(report.success);
        assert!(report.killed_pids.contains(&500));

        let stages: Vec<Stage> = report.stages_executed.iter().map(|r| r.stage).collect();
        assert!(!stages.contains(&Stage::TreeSoft));
        assert!(stages.contains(&Stage::TreeHard));
        assert!(report.stages_monotonic());
    }

    #[tokio::test]
    async fn test_permission_denied_escalates_to_failure() {
        let fake = FakeAdapter::new();
        fake.add(FakeProcess::new(600, "chrome").protected());

        let controller = EscalationController::new(fake);
        let report = controller.run(test_config()).await;

        assert!(!report.success);
        assert!(!report.timed_out);
        assert_eq!(report.residual_pids, [600].into_iter().collect());
        assert!(report.killed_pids.is_empty());

        // Every forceful stage was tried before giving up.
        let stages: Vec<Stage> = report.stages_executed.iter().map(|r| r.stage).collect();
        assert!(stages.contains(&Stage::TreeHard));
        assert!(stages.contains(&Stage::SystemWide));
        assert!(stages.contains(&Stage::Verify));
        assert!(report.stages_monotonic());
    }

    #[tokio::test]
    async fn test_idempotence_on_clean_group() {
        let fake = FakeAdapter::new();
        let controller = EscalationController::new(fake);

        for _ in 0..2 {
            let report = controller.run(test_config()).await;
            assert!(report.success);
            assert!(report.killed_pids.is_empty());
            assert!(report.residual_pids.is_empty());
        }
    }

    #[tokio::test]
    async fn test_timeout_marks_session_failed() {
        let fake = FakeAdapter::new();
        fake.add(FakeProcess::new(700, "chrome"));

        let config = CleanupConfig {
            timeout_secs: 0,
            ..test_config()
        };

        let controller = EscalationController::new(fake);
        let report = controller.run(config).await;

        assert!(report.timed_out);
        assert!(!report.success);
        assert_eq!(report.residual_pids, [700].into_iter().collect());
        assert!(report.killed_pids.is_empty());
        assert!(!report
            .stages_executed
            .iter()
            .any(|r| r.stage == Stage::Verify));
    }

    #[tokio::test]
    async fn test_user_data_dir_harvested_and_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("chrome_profile_x1");
        tokio::fs::create_dir_all(&data_dir).await.unwrap();

        let fake = FakeAdapter::new();
        fake.add(FakeProcess::new(1000, "chrome").with_cmdline(&format!(
            "/opt/chrome --headless --user-data-dir={}",
            data_dir.display()
        )));

        let controller = EscalationController::new(fake);
        let report = controller.run(test_config()).await;

        assert!(report.success);
        assert!(!data_dir.exists());
    }

    #[tokio::test]
    async fn test_registered_root_and_descendants() {
        // A driver root that matches no heuristic, registered explicitly.
        let fake = FakeAdapter::new();
        fake.add(FakeProcess::new(800, "driver-shim"));
        fake.add(FakeProcess::new(801, "worker-shim").with_parent(800));

        let config = CleanupConfig {
            root_pids: vec![800],
            ..test_config()
        };

        let controller = EscalationController::new(fake);
        let report = controller.run(config).await;

        assert!(report.success);
        assert_eq!(report.killed_pids, [800, 801].into_iter().collect());
    }

    #[tokio::test]
    async fn test_enumeration_unavailable_still_sweeps_ports() {
        let fake = std::sync::Arc::new(FakeAdapter::new());
        fake.add(FakeProcess::new(950, "opaque").on_port(9515));
        fake.disable_enumeration();

        let controller = EscalationController::new(fake.clone());
        let report = controller.run(test_config()).await;

        // The port owner is gone even though no snapshot could prove it,
        // so the report stays conservative about the residual set.
        assert!(!fake.alive(950));
        assert!(!report.success);

        let stages: Vec<Stage> = report.stages_executed.iter().map(|r| r.stage).collect();
        assert_eq!(stages, vec![Stage::PortBased]);
    }

    #[tokio::test]
    async fn test_graceful_stage_runs_with_driver() {
        struct QuittingDriver {
            fake: std::sync::Arc<FakeAdapter>,
        }

        impl DriverShutdown for QuittingDriver {
            async fn attempt_graceful_shutdown(&self) -> Result<()> {
                // The driver tears its own processes down.
                self.fake.clear();
                Ok(())
            }
        }

        let fake = std::sync::Arc::new(FakeAdapter::new());
        fake.add(FakeProcess::new(900, "chrome"));

        let driver = QuittingDriver { fake: fake.clone() };
        let controller = EscalationController::new(fake.clone());
        let report = controller
            .run_with_driver(test_config(), Some(&driver))
            .await;

        assert!(report.success);
        assert!(report.killed_pids.contains(&900));

        // Graceful alone was enough; no forceful stage ran.
        let stages: Vec<Stage> = report.stages_executed.iter().map(|r| r.stage).collect();
        assert_eq!(stages, vec![Stage::Graceful, Stage::Verify]);
    }
}
