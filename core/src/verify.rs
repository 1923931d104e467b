//! Final verification and working-directory cleanup.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::Result;
use crate::identify::ProcessIdentifier;
use crate::models::{ProcessGroup, ProcessRecord};
use crate::platform::PlatformAdapter;

/// Re-run identification with the original criteria and intersect with
/// the tracked group.
///
/// The returned records are the session's residual: tracked processes the
/// escalation stages failed to remove.
pub async fn verify_residual<P: PlatformAdapter>(
    platform: &P,
    identifier: &ProcessIdentifier,
    group: &ProcessGroup,
) -> Result<Vec<ProcessRecord>> {
    let rescan = identifier.scan(platform).await?;

    let residual: Vec<ProcessRecord> = rescan
        .into_iter()
        .filter(|record| group.contains(record.pid))
        .collect();

    debug!(count = residual.len(), "verification rescan complete");
    Ok(residual)
}

/// Best-effort, order-independent removal of session working directories.
///
/// Failures are logged and suppressed; leftover directories do not affect
/// process-level correctness.
pub async fn remove_data_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => debug!(dir = %dir.display(), "removed working directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to remove working directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identify::MatchCriteria;
    use crate::models::MatchReason;
    use crate::testing::{FakeAdapter, FakeProcess};

    #[tokio::test]
    async fn test_residual_is_rescan_intersect_group() {
        let fake = FakeAdapter::new();
        fake.add(FakeProcess::new(10, "chrome"));
        fake.add(FakeProcess::new(11, "chrome"));

        // Only PID 10 belongs to this session; 11 is someone else's.
        let mut group = ProcessGroup::new();
        group.insert(10, MatchReason::Name);

        let identifier = ProcessIdentifier::new(MatchCriteria::default());
        let residual = verify_residual(&fake, &identifier, &group).await.unwrap();

        assert_eq!(residual.len(), 1);
        assert_eq!(residual[0].pid, 10);
    }

    #[tokio::test]
    async fn test_tracked_nonmatching_process_not_residual() {
        let fake = FakeAdapter::new();
        fake.add(FakeProcess::new(20, "nginx"));

        let mut group = ProcessGroup::new();
        group.insert(20, MatchReason::PortOwner);

        let identifier = ProcessIdentifier::new(MatchCriteria::default());
        let residual = verify_residual(&fake, &identifier, &group).await.unwrap();
        assert!(residual.is_empty());
    }

    #[tokio::test]
    async fn test_remove_data_dirs_best_effort() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("chrome_profile");
        tokio::fs::create_dir_all(data_dir.join("Default")).await.unwrap();
        tokio::fs::write(data_dir.join("Default").join("Cookies"), b"x")
            .await
            .unwrap();

        let missing = tmp.path().join("never_existed");

        remove_data_dirs(&[data_dir.clone(), missing]).await;
        assert!(!data_dir.exists());
    }
}
