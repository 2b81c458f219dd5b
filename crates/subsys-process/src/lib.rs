//! # Subsys Process
//!
//! Low-level process operations for supervised subsystems.
//!
//! This crate provides the Process Handle primitives:
//! - Spawning a child as leader of its own process group
//! - Group-wide termination and kill signals
//! - Asynchronous exit observation with an exit-code sentinel
//! - Group existence checks and executable validation

pub mod check;
pub mod execute;
pub mod exit;
pub mod terminate;
pub mod validation;

// Re-export main types
pub use check::group_exists;
pub use execute::{spawn_in_group, CommandSpec, SpawnedProcess};
pub use exit::{wait_for_exit, ExitOutcome};
pub use terminate::{ProcessGroup, SignalKind};
pub use validation::validate_executable;
