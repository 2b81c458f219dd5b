//! The capability set every supervised subsystem exposes to the host.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use subsys_common::{SubsystemName, SubsystemResult};
use subsys_state::{LifecycleState, ProcessState};
use tokio_util::sync::CancellationToken;

/// A supervised subsystem.
///
/// `start`, `stop` and `health_check` are mutually exclusive per instance.
/// Each observes `cancel` only while waiting; cancellation never interrupts
/// a spawn or signal already in progress.
#[async_trait]
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &str;

    /// Bring the subsystem up. Succeeds immediately if it is already running.
    async fn start(&self, cancel: &CancellationToken) -> SubsystemResult<()>;

    /// Bring the subsystem down. Succeeds immediately if it is not running.
    async fn stop(&self, cancel: &CancellationToken) -> SubsystemResult<()>;

    /// Probe the endpoint recorded by the last successful start.
    async fn health_check(&self, cancel: &CancellationToken) -> SubsystemResult<()>;

    fn status(&self) -> SubsystemStatus;
}

/// Point-in-time view of a subsystem's lifecycle record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubsystemStatus {
    pub name: SubsystemName,
    pub phase: ProcessState,
    pub running: bool,
    pub should_run: bool,
    pub last_exit_code: Option<i32>,
    pub pid: Option<u32>,
    pub check_url: Option<String>,
    pub restart_count: u32,
    pub last_transition: DateTime<Utc>,
}

impl SubsystemStatus {
    pub fn from_state(name: &str, state: &LifecycleState) -> Self {
        Self {
            name: SubsystemName::from(name),
            phase: state.phase(),
            running: state.is_running(),
            should_run: state.should_run(),
            last_exit_code: state.last_exit_code(),
            pid: state.pid(),
            check_url: state.check_url().map(str::to_string),
            restart_count: state.restart_count(),
            last_transition: state.machine().last_transition_time(),
        }
    }

    /// Not running although the operator still wants it to be.
    pub fn needs_restart(&self) -> bool {
        self.should_run && !self.running
    }
}
