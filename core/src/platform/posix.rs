//! POSIX signal delivery shared by the Unix adapters.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::debug;

use crate::error::{Error, Result};

/// Send SIGTERM (soft) or SIGKILL (forceful) to a process.
///
/// ESRCH means the target exited first; under enumeration races that is a
/// success, not a failure.
pub(crate) fn send_signal(pid: u32, force: bool) -> Result<bool> {
    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    debug!(pid = pid, signal = %signal, "sending signal");

    match kill(Pid::from_raw(pid as i32), signal) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => {
            debug!(pid = pid, "process already gone");
            Ok(true)
        }
        Err(Errno::EPERM) => Err(Error::PermissionDenied(pid)),
        Err(e) => Err(Error::CommandFailed(format!(
            "kill -{} {} failed: {}",
            signal, pid, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_nonexistent_process_is_success() {
        // A PID far above any live process: delivery races resolve to Ok.
        let result = send_signal(999_999_999, false);
        match result {
            Ok(true) => {}
            Err(Error::PermissionDenied(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_soft_signal_self_spawned_child() {
        let mut child = std::process::Command::new("/bin/sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");

        assert!(send_signal(child.id(), false).unwrap());
        let status = child.wait().expect("wait for child");
        assert!(!status.success());
    }
}
