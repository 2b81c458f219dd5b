//! Process execution primitives.
//!
//! Children are always started as the leader of a fresh process group so that
//! signals addressed to the group also reach any workers they fork.

use crate::terminate::ProcessGroup;
use std::path::PathBuf;
use std::process::Stdio;
use subsys_common::{SubsystemError, SubsystemResult};
use tokio::process::{Child, Command};
use tracing::debug;

/// Everything needed to launch one child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Label used in errors and logs.
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// A freshly spawned child.
///
/// `stdout` and `stderr` are piped; take them off `child` before handing the
/// child to the exit waiter.
#[derive(Debug)]
pub struct SpawnedProcess {
    pub child: Child,
    pub pid: u32,
    pub group: ProcessGroup,
}

/// Spawn `spec` as the leader of a new process group.
///
/// Fails with `SpawnFailed` if the executable cannot be launched.
pub fn spawn_in_group(spec: &CommandSpec) -> SubsystemResult<SpawnedProcess> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(ref dir) = spec.working_dir {
        cmd.current_dir(dir);
    }

    // pgid 0 makes the child's pid its process group id.
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd
        .spawn()
        .map_err(|e| SubsystemError::spawn_failed(&spec.name, e.to_string()))?;

    let pid = child
        .id()
        .ok_or_else(|| SubsystemError::spawn_failed(&spec.name, "child exited before its pid was read"))?;

    debug!(
        subsystem = %spec.name,
        pid,
        program = %spec.program.display(),
        "Spawned process in new process group"
    );

    Ok(SpawnedProcess {
        child,
        pid,
        group: ProcessGroup::led_by(pid),
    })
}
