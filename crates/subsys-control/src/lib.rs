//! # Subsys Control
//!
//! Lifecycle control of supervised subsystems.
//!
//! This crate provides:
//! - The [`Subsystem`] capability set (start, stop, health check, status)
//! - [`ServerSubsystem`], the controller for a long-running server child
//! - A process-wide registry instantiating subsystems by kind
//! - YAML configuration for the host agent and its subsystems

pub mod config;
pub mod registry;
pub mod server;
pub mod subsystem;

// Re-export main types
pub use config::{AgentConfig, AgentOptions, SubsystemConfig};
pub use registry::{
    create_subsystem, is_registered, list_registered_subsystems, register_builtin_subsystems,
    register_subsystem, SubsystemFactory,
};
pub use server::{ServerSubsystem, SUBSYSTEM_KIND};
pub use subsystem::{Subsystem, SubsystemStatus};

pub use subsys_common::{SubsystemError, SubsystemResult};
pub use subsys_monitoring::HealthStatus;
pub use subsys_state::{LifecycleState, ProcessState};
