//! Error types for supervised subsystems.
//!
//! Every operation the controller exposes (`start`, `stop`, `health_check`)
//! returns [`SubsystemResult`]. The variants map one-to-one onto the failure
//! classes a caller is expected to react to:
//!
//! | Variant | Raised by | Caller reaction |
//! |---------|-----------|-----------------|
//! | `SpawnFailed` | start | fix installation, retry later |
//! | `StartTimeout` / `StartCancelled` | start | child may still be running; stop or retry |
//! | `ExitedBeforeReady` | start | child crashed during startup |
//! | `DuplicateWatcher` | output matcher | programming error |
//! | `KillFailed` | stop | fatal, needs operator attention |
//! | `NotRunning` / `NoEndpoint` / `HealthCheckFailed` | health_check | caller's polling policy |
//!
//! ```
//! use subsys_common::{SubsystemError, SubsystemResult};
//!
//! fn check() -> SubsystemResult<()> {
//!     Err(SubsystemError::not_running("app-server"))
//! }
//!
//! let err = check().unwrap_err();
//! assert!(err.is_health_failure());
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type for subsystem operations.
pub type SubsystemResult<T> = std::result::Result<T, SubsystemError>;

/// Error taxonomy for subsystem lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubsystemError {
    #[error("Error starting {name}: {reason}")]
    SpawnFailed { name: String, reason: String },

    #[error("Startup of {name} timed out after {timeout:?}")]
    StartTimeout { name: String, timeout: Duration },

    #[error("Startup of {name} cancelled")]
    StartCancelled { name: String },

    #[error("{name} exited before becoming ready (exit code {exit_code})")]
    ExitedBeforeReady { name: String, exit_code: i32 },

    #[error("Watcher already registered: {watcher}")]
    DuplicateWatcher { watcher: String },

    #[error("{name} process couldn't be killed")]
    KillFailed { name: String },

    #[error("{name} not running")]
    NotRunning { name: String },

    #[error("Can't find listening URL for {name}")]
    NoEndpoint { name: String },

    #[error("Checking {name} status failed: {reason}")]
    HealthCheckFailed {
        name: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Failed to signal process group {pgid}: {reason}")]
    SignalFailed { pgid: i32, reason: String },

    #[error("Error while getting status of process {pid}: {reason}")]
    WaitFailed { pid: i32, reason: String },

    #[error("Invalid state transition for {name}: {from} -> {to}")]
    InvalidTransition {
        name: String,
        from: String,
        to: String,
    },

    #[error("Unknown subsystem: {name}")]
    UnknownSubsystem { name: String },

    #[error("Subsystem already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Configuration error: {name} - {reason}")]
    Configuration { name: String, reason: String },
}

impl SubsystemError {
    pub fn spawn_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn start_timeout(name: impl Into<String>, timeout: Duration) -> Self {
        Self::StartTimeout {
            name: name.into(),
            timeout,
        }
    }

    pub fn start_cancelled(name: impl Into<String>) -> Self {
        Self::StartCancelled { name: name.into() }
    }

    pub fn exited_before_ready(name: impl Into<String>, exit_code: i32) -> Self {
        Self::ExitedBeforeReady {
            name: name.into(),
            exit_code,
        }
    }

    pub fn duplicate_watcher(watcher: impl Into<String>) -> Self {
        Self::DuplicateWatcher {
            watcher: watcher.into(),
        }
    }

    pub fn kill_failed(name: impl Into<String>) -> Self {
        Self::KillFailed { name: name.into() }
    }

    pub fn not_running(name: impl Into<String>) -> Self {
        Self::NotRunning { name: name.into() }
    }

    pub fn no_endpoint(name: impl Into<String>) -> Self {
        Self::NoEndpoint { name: name.into() }
    }

    pub fn health_check_failed(
        name: impl Into<String>,
        status: Option<u16>,
        reason: impl Into<String>,
    ) -> Self {
        Self::HealthCheckFailed {
            name: name.into(),
            status,
            reason: reason.into(),
        }
    }

    pub fn signal_failed(pgid: i32, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            pgid,
            reason: reason.into(),
        }
    }

    pub fn wait_failed(pid: i32, reason: impl Into<String>) -> Self {
        Self::WaitFailed {
            pid,
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            name: name.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn unknown_subsystem(name: impl Into<String>) -> Self {
        Self::UnknownSubsystem { name: name.into() }
    }

    pub fn already_registered(name: impl Into<String>) -> Self {
        Self::AlreadyRegistered { name: name.into() }
    }

    pub fn configuration(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for failures of a start attempt.
    pub fn is_start_failure(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed { .. }
                | Self::StartTimeout { .. }
                | Self::StartCancelled { .. }
                | Self::ExitedBeforeReady { .. }
        )
    }

    /// True for failures reported by a health check.
    pub fn is_health_failure(&self) -> bool {
        matches!(
            self,
            Self::NotRunning { .. } | Self::NoEndpoint { .. } | Self::HealthCheckFailed { .. }
        )
    }
}
