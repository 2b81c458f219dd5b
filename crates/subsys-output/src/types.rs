//! Core types for output capture

use serde::{Deserialize, Serialize};

/// Log level a captured line is forwarded at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Stream type (stdout or stderr)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Stdout,
    Stderr,
}

impl StreamType {
    /// Level lines from this stream are logged at. stderr is elevated.
    pub fn log_level(&self) -> LogLevel {
        match self {
            StreamType::Stdout => LogLevel::Info,
            StreamType::Stderr => LogLevel::Error,
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamType::Stdout => write!(f, "stdout"),
            StreamType::Stderr => write!(f, "stderr"),
        }
    }
}

/// Captured groups of one match. Index 0 is the whole match; groups that did
/// not participate are empty strings.
pub type Captures = Vec<String>;

/// Counters for one matcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputStats {
    pub lines_processed: u64,
    pub bytes_processed: u64,
    pub matches_delivered: u64,
    pub matches_dropped: u64,
}
