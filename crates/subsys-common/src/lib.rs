//! # Subsys Common
//!
//! Types shared across the subsystem supervision crates.
//!
//! This crate provides the foundational pieces every other crate builds on:
//! - The [`SubsystemError`] taxonomy and [`SubsystemResult`] alias
//! - The [`SubsystemName`] identifier

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{SubsystemError, SubsystemResult};
pub use types::{SubsystemName, EXIT_CODE_SIGNALED};
