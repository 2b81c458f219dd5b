//! Exit observation.
//!
//! [`wait_for_exit`] is meant to run in a dedicated background task (the
//! reaper); it must never sit on a caller's start/stop path.

use subsys_common::{SubsystemError, SubsystemResult, EXIT_CODE_SIGNALED};
use tokio::process::Child;

/// How a child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// OS exit status, absent when the child was killed by a signal.
    pub code: Option<i32>,
    /// Terminating signal number, if any.
    pub signal: Option<i32>,
}

impl ExitOutcome {
    fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    /// Exit code, or [`EXIT_CODE_SIGNALED`] when there is none to report.
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(EXIT_CODE_SIGNALED)
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Wait until `child` exits and report its outcome.
///
/// Cancel safe: dropping the future leaves the child untouched.
pub async fn wait_for_exit(child: &mut Child) -> SubsystemResult<ExitOutcome> {
    let pid = child.id().map(|p| p as i32).unwrap_or(0);
    let status = child
        .wait()
        .await
        .map_err(|e| SubsystemError::wait_failed(pid, e.to_string()))?;
    Ok(ExitOutcome::from_status(status))
}
