//! Process-group termination primitives.
//!
//! Signals are always addressed to the whole group (negative-pid semantics),
//! never to the leader alone: a supervised server may fork workers that must
//! go down with it.

use subsys_common::{SubsystemError, SubsystemResult};
use tracing::debug;

/// Kind of termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Graceful termination request (SIGTERM).
    Terminate,
    /// Immediate, uncatchable kill (SIGKILL).
    Kill,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Terminate => "SIGTERM",
            SignalKind::Kill => "SIGKILL",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target for group-wide signals.
///
/// Distinct from the child handle: the handle is owned by the exit waiter,
/// while the group reference is cheap to copy and safe to use from `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGroup {
    pgid: i32,
}

impl ProcessGroup {
    /// Group whose id equals the leader's pid.
    pub fn led_by(pid: u32) -> Self {
        Self { pgid: pid as i32 }
    }

    pub fn pgid(&self) -> i32 {
        self.pgid
    }

    /// Deliver `kind` to every process in the group.
    pub fn signal(&self, kind: SignalKind) -> SubsystemResult<()> {
        debug!(pgid = self.pgid, signal = %kind, "Signalling process group");
        signal_group(self.pgid, kind)
    }

    /// True while at least one member of the group exists.
    pub fn is_alive(&self) -> SubsystemResult<bool> {
        crate::check::group_exists(self.pgid)
    }
}

#[cfg(unix)]
fn signal_group(pgid: i32, kind: SignalKind) -> SubsystemResult<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let signal = match kind {
        SignalKind::Terminate => Signal::SIGTERM,
        SignalKind::Kill => Signal::SIGKILL,
    };

    killpg(Pid::from_raw(pgid), signal).map_err(|e| SubsystemError::signal_failed(pgid, e.to_string()))
}

#[cfg(not(unix))]
fn signal_group(pgid: i32, _kind: SignalKind) -> SubsystemResult<()> {
    Err(SubsystemError::signal_failed(
        pgid,
        "process groups are not supported on this platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::execute::{spawn_in_group, CommandSpec};
    use crate::exit::wait_for_exit;
    use std::time::Duration;

    #[tokio::test]
    async fn test_terminate_reaches_group_leader() {
        let spec = CommandSpec::new("sleeper", "/bin/sh").arg("-c").arg("exec sleep 30");
        let mut spawned = spawn_in_group(&spec).unwrap();

        spawned.group.signal(SignalKind::Terminate).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), wait_for_exit(&mut spawned.child))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.signal, Some(15));
    }

    #[tokio::test]
    async fn test_kill_overrides_ignored_terminate() {
        let spec = CommandSpec::new("stubborn", "/bin/sh")
            .arg("-c")
            .arg("trap '' TERM; while :; do sleep 0.1; done");
        let mut spawned = spawn_in_group(&spec).unwrap();
        let group = spawned.group;
        tokio::time::sleep(Duration::from_millis(100)).await;

        group.signal(SignalKind::Terminate).unwrap();
        let still_running =
            tokio::time::timeout(Duration::from_millis(300), wait_for_exit(&mut spawned.child)).await;
        assert!(still_running.is_err(), "TERM should have been ignored");

        group.signal(SignalKind::Kill).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), wait_for_exit(&mut spawned.child))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.exit_code(), subsys_common::EXIT_CODE_SIGNALED);
    }

    #[tokio::test]
    async fn test_group_is_not_alive_after_reap() {
        let spec = CommandSpec::new("short", "/bin/sh").arg("-c").arg("exit 0");
        let mut spawned = spawn_in_group(&spec).unwrap();
        wait_for_exit(&mut spawned.child).await.unwrap();

        assert!(!spawned.group.is_alive().unwrap());
        assert!(spawned.group.signal(SignalKind::Terminate).is_err());
    }

    #[test]
    fn test_signal_kind_names() {
        assert_eq!(SignalKind::Terminate.to_string(), "SIGTERM");
        assert_eq!(SignalKind::Kill.as_str(), "SIGKILL");
    }
}
