//! # Subsys State
//!
//! The lifecycle record of one supervised subsystem and the state machine
//! its phase moves through.
//!
//! [`LifecycleState`] is plain data. The controller keeps it behind its state
//! lock and mutates it only through the methods here, both from the calling
//! operation and from the background reaper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use subsys_common::{SubsystemError, SubsystemResult};

const MAX_HISTORY: usize = 100;

/// Lifecycle phase of a subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// No child, or the last child has been reaped
    Stopped,
    /// Child spawned (or about to be), readiness not yet seen
    Starting,
    /// Readiness seen, endpoint recorded
    Running,
    /// Termination requested, child not yet reaped
    Stopping,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Starting => write!(f, "starting"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Represents a state transition with timestamp and optional reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: ProcessState,
    pub to_state: ProcessState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Phase state machine with a bounded transition history
#[derive(Debug, Clone)]
pub struct ProcessStateMachine {
    name: String,
    current_state: ProcessState,
    state_history: Vec<StateTransition>,
    last_transition_time: DateTime<Utc>,
}

impl ProcessStateMachine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            current_state: ProcessState::Stopped,
            state_history: Vec::new(),
            last_transition_time: Utc::now(),
        }
    }

    pub fn current_state(&self) -> ProcessState {
        self.current_state
    }

    pub fn state_history(&self) -> &[StateTransition] {
        &self.state_history
    }

    pub fn last_transition_time(&self) -> DateTime<Utc> {
        self.last_transition_time
    }

    /// Check if a transition from current state to target state is valid
    pub fn is_valid_transition(&self, target_state: ProcessState) -> bool {
        use ProcessState::*;
        match (self.current_state, target_state) {
            (Stopped, Starting) => true,

            // Ready, stop requested mid-start, or spawn failed / exited early
            (Starting, Running) | (Starting, Stopping) | (Starting, Stopped) => true,

            // Stop requested, or crashed
            (Running, Stopping) | (Running, Stopped) => true,

            (Stopping, Stopped) => true,

            (state, target) if state == target => true,

            _ => false,
        }
    }

    /// Transition to a new state with optional reason
    pub fn transition_to(
        &mut self,
        target_state: ProcessState,
        reason: Option<String>,
    ) -> SubsystemResult<()> {
        if !self.is_valid_transition(target_state) {
            return Err(SubsystemError::invalid_transition(
                &self.name,
                self.current_state.to_string(),
                target_state.to_string(),
            ));
        }

        let from_state = self.current_state;
        let now = Utc::now();
        self.current_state = target_state;
        self.last_transition_time = now;
        self.state_history.push(StateTransition {
            from_state,
            to_state: target_state,
            timestamp: now,
            reason,
        });

        if self.state_history.len() > MAX_HISTORY {
            self.state_history.remove(0);
        }

        tracing::debug!(
            subsystem = %self.name,
            from = %from_state,
            to = %target_state,
            "Phase transition"
        );

        Ok(())
    }

    /// Count transitions to a specific state still in the history window
    pub fn count_transitions_to(&self, state: ProcessState) -> usize {
        self.state_history
            .iter()
            .filter(|t| t.to_state == state)
            .count()
    }
}

/// How a start attempt should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// Operator asked for the subsystem to run
    Fresh,
    /// The subsystem was meant to be running but its child went away
    Restart,
}

/// Shared record of one subsystem's child and the operator's intent.
///
/// `running` is true from a successful spawn until the reaper observes the
/// exit; it is the only source of truth for liveness. `check_url` is set only
/// by a successful start and cleared whenever a new start begins.
#[derive(Debug, Clone)]
pub struct LifecycleState {
    machine: ProcessStateMachine,
    running: bool,
    should_run: bool,
    last_exit_code: Option<i32>,
    check_url: Option<String>,
    pid: Option<u32>,
    restart_count: u32,
}

impl LifecycleState {
    pub fn new(name: &str) -> Self {
        Self {
            machine: ProcessStateMachine::new(name),
            running: false,
            should_run: false,
            last_exit_code: None,
            check_url: None,
            pid: None,
            restart_count: 0,
        }
    }

    pub fn phase(&self) -> ProcessState {
        self.machine.current_state()
    }

    pub fn machine(&self) -> &ProcessStateMachine {
        &self.machine
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn should_run(&self) -> bool {
        self.should_run
    }

    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    pub fn check_url(&self) -> Option<&str> {
        self.check_url.as_deref()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Enter `Starting`. Must only be called while not running.
    ///
    /// Intent still set from before means the previous child went away on its
    /// own, so this start is a restart.
    pub fn begin_start(&mut self) -> SubsystemResult<StartKind> {
        let kind = if self.should_run {
            StartKind::Restart
        } else {
            StartKind::Fresh
        };

        let reason = match kind {
            StartKind::Fresh => "start requested",
            StartKind::Restart => "restart after unexpected exit",
        };
        self.machine
            .transition_to(ProcessState::Starting, Some(reason.to_string()))?;

        if kind == StartKind::Restart {
            self.restart_count += 1;
        }
        self.should_run = true;
        self.check_url = None;
        Ok(kind)
    }

    /// Record a successful spawn. From here until the reaper reports, the
    /// child counts as running.
    pub fn mark_spawned(&mut self, pid: u32) {
        self.running = true;
        self.pid = Some(pid);
    }

    /// Spawn never happened; fall back to `Stopped` with intent untouched.
    pub fn mark_spawn_failed(&mut self, reason: impl Into<String>) {
        if let Err(e) = self
            .machine
            .transition_to(ProcessState::Stopped, Some(reason.into()))
        {
            tracing::warn!(error = %e, "Unexpected phase on spawn failure");
        }
    }

    /// Readiness seen: record the endpoint and enter `Running`.
    ///
    /// Fails if the reaper already observed the exit, in which case the URL
    /// points at nothing.
    pub fn mark_ready(&mut self, url: impl Into<String>) -> SubsystemResult<()> {
        if !self.running {
            return Err(SubsystemError::exited_before_ready(
                &self.machine.name,
                self.last_exit_code
                    .unwrap_or(subsys_common::EXIT_CODE_SIGNALED),
            ));
        }
        self.machine
            .transition_to(ProcessState::Running, Some("readiness observed".to_string()))?;
        self.check_url = Some(url.into());
        Ok(())
    }

    /// Drop the intent to run. Returns whether a child is still running.
    pub fn clear_intent(&mut self) -> bool {
        self.should_run = false;
        self.running
    }

    /// Enter `Stopping` ahead of signalling the child.
    pub fn begin_stop(&mut self) -> SubsystemResult<()> {
        self.machine
            .transition_to(ProcessState::Stopping, Some("stop requested".to_string()))
    }

    /// The reaper observed the child's exit.
    pub fn mark_exited(&mut self, exit_code: i32) {
        self.running = false;
        self.last_exit_code = Some(exit_code);
        self.pid = None;

        let reason = if self.should_run {
            format!("unexpected exit with code {exit_code}")
        } else {
            format!("exited with code {exit_code}")
        };
        // Every phase may move to Stopped.
        if let Err(e) = self.machine.transition_to(ProcessState::Stopped, Some(reason)) {
            tracing::warn!(error = %e, "Unexpected phase on exit");
        }
    }
}
