//! Lifecycle controller for a long-running server child.
//!
//! The child is launched as `<bin_dir>/<executable> -config <config_file>`
//! from `install_root`, in its own process group. It is considered started
//! once it prints a `serving {"url": ...}` line on stdout; the URL becomes
//! the health-check endpoint.
//!
//! Two locks guard an instance. `op_lock` serialises whole `start`, `stop`
//! and `health_check` calls and is held across their waits. The state lock
//! protects [`LifecycleState`] and is only held for short, non-awaiting
//! sections, so the reaper can record an exit while an operation waits.

pub mod readiness;

use crate::config::SubsystemConfig;
use crate::registry;
use crate::subsystem::{Subsystem, SubsystemStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use readiness::{endpoint_from, READY_PATTERN, READY_WATCHER};
use std::sync::Arc;
use std::time::Duration;
use subsys_common::{SubsystemError, SubsystemName, SubsystemResult};
use subsys_monitoring::HttpProber;
use subsys_output::{OutputMatcher, StreamType};
use subsys_process::{
    spawn_in_group, validate_executable, wait_for_exit, CommandSpec, ProcessGroup, SignalKind,
    SpawnedProcess,
};
use subsys_state::{LifecycleState, StartKind};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Registry key of this controller
pub const SUBSYSTEM_KIND: &str = "app-server";

/// Register [`ServerSubsystem`] under [`SUBSYSTEM_KIND`].
pub fn register() -> SubsystemResult<()> {
    registry::register_subsystem(SUBSYSTEM_KIND, |config| {
        Ok(Arc::new(ServerSubsystem::new(config.clone())?) as Arc<dyn Subsystem>)
    })
}

struct ControllerState {
    lifecycle: LifecycleState,
    /// Signal target of the live child; `None` once it has been reaped.
    group: Option<ProcessGroup>,
}

enum StartOutcome {
    Ready(Vec<String>),
    Exited(i32),
    Cancelled,
    TimedOut,
}

/// Removes the readiness watcher on every exit path of `start`.
struct WatcherGuard<'a> {
    matcher: &'a OutputMatcher,
    name: &'static str,
}

impl Drop for WatcherGuard<'_> {
    fn drop(&mut self) {
        self.matcher.delete_matcher(self.name);
    }
}

pub struct ServerSubsystem {
    name: SubsystemName,
    config: SubsystemConfig,
    op_lock: tokio::sync::Mutex<()>,
    state: Arc<Mutex<ControllerState>>,
    stdout: OutputMatcher,
    stderr: OutputMatcher,
    prober: HttpProber,
}

impl std::fmt::Debug for ServerSubsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSubsystem")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}

impl ServerSubsystem {
    pub fn new(config: SubsystemConfig) -> SubsystemResult<Self> {
        let name = SubsystemName::new(config.name.clone());
        let prober = HttpProber::new()
            .map_err(|e| SubsystemError::configuration(&name, e.to_string()))?;

        // Installation may still be in progress; spawn reports it if it stays broken.
        if let Err(e) = validate_executable(name.as_str(), &config.executable_path()) {
            warn!(subsystem = %name, error = %e, "Executable not usable yet");
        }

        Ok(Self {
            stdout: OutputMatcher::new(&name, StreamType::Stdout),
            stderr: OutputMatcher::new(&name, StreamType::Stderr),
            state: Arc::new(Mutex::new(ControllerState {
                lifecycle: LifecycleState::new(name.as_str()),
                group: None,
            })),
            op_lock: tokio::sync::Mutex::new(()),
            prober,
            config,
            name,
        })
    }

    /// Matcher fed by the child's stdout
    pub fn stdout(&self) -> &OutputMatcher {
        &self.stdout
    }

    /// Matcher fed by the child's stderr
    pub fn stderr(&self) -> &OutputMatcher {
        &self.stderr
    }

    fn command_spec(&self) -> CommandSpec {
        CommandSpec::new(&self.name, self.config.executable_path())
            .arg("-config")
            .arg(self.config.config_file.to_string_lossy().into_owned())
            .working_dir(&self.config.install_root)
    }

    async fn start_inner(&self, cancel: &CancellationToken) -> SubsystemResult<()> {
        let (kind, restart_count) = {
            let mut state = self.state.lock();
            if state.lifecycle.is_running() {
                debug!(subsystem = %self.name, "Already running");
                return Ok(());
            }
            let kind = state.lifecycle.begin_start()?;
            (kind, state.lifecycle.restart_count())
        };

        match kind {
            StartKind::Fresh => info!(subsystem = %self.name, "Starting"),
            StartKind::Restart => warn!(
                subsystem = %self.name,
                restart_count,
                "Restarting after unexpected exit"
            ),
        }

        // Workers of an earlier child may still hold the old pipes.
        self.stdout.next_generation();
        self.stderr.next_generation();

        let mut ready_rx = match self
            .stdout
            .add_matcher(READY_WATCHER, READY_PATTERN.clone(), false)
        {
            Ok(rx) => rx,
            Err(e) => {
                self.state.lock().lifecycle.mark_spawn_failed(e.to_string());
                return Err(e);
            }
        };
        let _watcher = WatcherGuard {
            matcher: &self.stdout,
            name: READY_WATCHER,
        };

        let spec = self.command_spec();
        let SpawnedProcess {
            mut child,
            pid,
            group,
        } = match spawn_in_group(&spec) {
            Ok(spawned) => spawned,
            Err(e) => {
                error!(subsystem = %self.name, error = %e, "Spawn failed");
                self.state.lock().lifecycle.mark_spawn_failed(e.to_string());
                return Err(e);
            }
        };

        if let Some(stdout) = child.stdout.take() {
            self.stdout.attach(stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            self.stderr.attach(stderr);
        }

        {
            let mut state = self.state.lock();
            state.lifecycle.mark_spawned(pid);
            state.group = Some(group);
        }
        debug!(subsystem = %self.name, pid, "Spawned");

        let mut exit_rx = self.spawn_reaper(child, pid);

        let timeout = self.config.start_timeout;
        let outcome = tokio::select! {
            biased;
            Some(captures) = ready_rx.recv() => StartOutcome::Ready(captures),
            Ok(code) = &mut exit_rx => StartOutcome::Exited(code),
            _ = cancel.cancelled() => StartOutcome::Cancelled,
            _ = sleep(timeout) => StartOutcome::TimedOut,
        };

        match outcome {
            StartOutcome::Ready(captures) => {
                let Some(url) = endpoint_from(&captures) else {
                    return Err(SubsystemError::no_endpoint(&self.name));
                };
                self.state.lock().lifecycle.mark_ready(url)?;
                info!(subsystem = %self.name, url = %url, "Health check URL");
                info!(subsystem = %self.name, pid, "Started");
                Ok(())
            }
            StartOutcome::Exited(exit_code) => {
                warn!(subsystem = %self.name, exit_code, "Exited before becoming ready");
                Err(SubsystemError::exited_before_ready(&self.name, exit_code))
            }
            StartOutcome::Cancelled => {
                warn!(subsystem = %self.name, pid, "Startup cancelled, child left running");
                Err(SubsystemError::start_cancelled(&self.name))
            }
            StartOutcome::TimedOut => {
                warn!(subsystem = %self.name, pid, ?timeout, "Startup timed out, child left running");
                Err(SubsystemError::start_timeout(&self.name, timeout))
            }
        }
    }

    /// Wait for `child` in the background and record its exit.
    ///
    /// The returned channel fires with the exit code once the state has been
    /// updated.
    fn spawn_reaper(&self, mut child: Child, pid: u32) -> oneshot::Receiver<i32> {
        let (exit_tx, exit_rx) = oneshot::channel();
        let state = Arc::clone(&self.state);
        let name = self.name.clone();

        tokio::spawn(async move {
            let outcome = wait_for_exit(&mut child).await;
            let exit_code = outcome
                .as_ref()
                .map(|o| o.exit_code())
                .unwrap_or(subsys_common::EXIT_CODE_SIGNALED);

            {
                let mut state = state.lock();
                state.lifecycle.mark_exited(exit_code);
                state.group = None;
            }

            info!(subsystem = %name, pid, "Exited");
            if let Err(e) = &outcome {
                error!(subsystem = %name, pid, error = %e, "Error while getting process status");
            }
            if exit_code != 0 {
                error!(subsystem = %name, pid, exit_code, "Non-zero exit code");
            }

            let _ = exit_tx.send(exit_code);
        });

        exit_rx
    }

    async fn stop_inner(&self, cancel: &CancellationToken) -> SubsystemResult<()> {
        let group = {
            let mut state = self.state.lock();
            if !state.lifecycle.clear_intent() {
                return Ok(());
            }
            // Not spawned yet
            let Some(group) = state.group else {
                return Ok(());
            };
            state.lifecycle.begin_stop()?;
            group
        };

        info!(subsystem = %self.name, pgid = group.pgid(), "Stopping");

        if let Err(e) = group.signal(SignalKind::Terminate) {
            error!(subsystem = %self.name, error = %e, "Failed to send SIGTERM");
        }

        let window = self.config.stop_timeout / 2;
        if self.wait_for_exit(cancel, window).await {
            info!(subsystem = %self.name, "Successfully stopped");
            self.report_lingering(group);
            return Ok(());
        }

        warn!(subsystem = %self.name, "Refused to exit, killing");
        if let Err(e) = group.signal(SignalKind::Kill) {
            error!(subsystem = %self.name, error = %e, "Failed to send SIGKILL");
        }

        if self.wait_for_exit(cancel, window).await {
            info!(subsystem = %self.name, "Successfully killed");
            self.report_lingering(group);
            return Ok(());
        }

        error!(subsystem = %self.name, pgid = group.pgid(), "Process couldn't be killed");
        Err(SubsystemError::kill_failed(&self.name))
    }

    /// The leader is gone; members it forked may have outlived it.
    fn report_lingering(&self, group: ProcessGroup) {
        match group.is_alive() {
            Ok(true) => warn!(
                subsystem = %self.name,
                pgid = group.pgid(),
                "Process group still has members after leader exit"
            ),
            Ok(false) => {}
            Err(e) => debug!(subsystem = %self.name, error = %e, "Process group check failed"),
        }
    }

    /// Poll until the reaper reports the exit, for at most `window`.
    ///
    /// Once the window closes (or `cancel` fires) one more poll interval is
    /// granted before the final check. Returns whether the child exited.
    async fn wait_for_exit(&self, cancel: &CancellationToken, window: Duration) -> bool {
        let poll = self.config.stop_poll_interval;
        let deadline = Instant::now() + window;
        let mut last_try = false;

        loop {
            let running = self.state.lock().lifecycle.is_running();
            if !running || last_try {
                return !running;
            }

            let now = Instant::now();
            let nap = if now >= deadline || cancel.is_cancelled() {
                last_try = true;
                poll
            } else {
                poll.min(deadline - now)
            };
            sleep(nap).await;
        }
    }

    async fn health_check_inner(&self, cancel: &CancellationToken) -> SubsystemResult<()> {
        let url = {
            let state = self.state.lock();
            if !state.lifecycle.is_running() {
                return Err(SubsystemError::not_running(&self.name));
            }
            match state.lifecycle.check_url() {
                Some(url) => url.to_string(),
                None => return Err(SubsystemError::no_endpoint(&self.name)),
            }
        };

        debug!(subsystem = %self.name, url = %url, "Starting health check");

        match self
            .prober
            .probe(&url, self.config.health_check_timeout, cancel)
            .await
        {
            Ok(status) => {
                debug!(subsystem = %self.name, status, "Health check is good");
                Ok(())
            }
            Err(e) => Err(SubsystemError::health_check_failed(
                &self.name,
                e.status(),
                e.to_string(),
            )),
        }
    }
}

#[async_trait]
impl Subsystem for ServerSubsystem {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    async fn start(&self, cancel: &CancellationToken) -> SubsystemResult<()> {
        let _op = self.op_lock.lock().await;
        self.start_inner(cancel).await
    }

    async fn stop(&self, cancel: &CancellationToken) -> SubsystemResult<()> {
        let _op = self.op_lock.lock().await;
        self.stop_inner(cancel).await
    }

    async fn health_check(&self, cancel: &CancellationToken) -> SubsystemResult<()> {
        let _op = self.op_lock.lock().await;
        self.health_check_inner(cancel).await
    }

    fn status(&self) -> SubsystemStatus {
        SubsystemStatus::from_state(self.name.as_str(), &self.state.lock().lifecycle)
    }
}
