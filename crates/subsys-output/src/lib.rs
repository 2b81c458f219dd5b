//! # Subsys Output
//!
//! Child output capture for supervised subsystems.
//!
//! This crate provides:
//! - Line-by-line capture of a child's stdout/stderr
//! - Forwarding of every line to `tracing` (stderr at elevated severity)
//! - Named regex watchers delivering captured groups without blocking the reader
//! - Per-child generations so a new child's watchers ignore older output

pub mod matcher;
pub mod reader;
pub mod types;

// Re-export main types
pub use matcher::OutputMatcher;
pub use reader::{read_lines, MAX_LINE_BYTES};
pub use types::{Captures, LogLevel, OutputStats, StreamType};
