//! # Subsys Monitoring
//!
//! Health probing for supervised subsystems.
//!
//! This crate provides:
//! - A bounded, cancellable HTTP GET probe
//! - Classification of probe outcomes into success and failure reasons
//! - Health status tracking across repeated checks

pub mod http;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why a probe did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("invalid probe URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {reason}")]
    Client { reason: String },

    #[error("request failed: {reason}")]
    Request { reason: String },

    #[error("no response within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("probe cancelled")]
    Cancelled,

    #[error("got code: {status}")]
    Status { status: u16 },
}

impl ProbeError {
    /// HTTP status carried by the failure, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProbeError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Accept a response status iff it lies in `[200, 300)`.
pub fn classify_status(status: u16) -> ProbeResult<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(ProbeError::Status { status })
    }
}

/// Health status tracker for a subsystem across repeated checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub failure_reason: Option<String>,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            is_healthy: true,
            last_check: None,
            last_success: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            failure_reason: None,
        }
    }

    pub fn record_success(&mut self) {
        let now = Utc::now();
        self.is_healthy = true;
        self.last_check = Some(now);
        self.last_success = Some(now);
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        self.failure_reason = None;
    }

    /// Record a failed check. The status only flips to unhealthy once
    /// `failure_threshold` consecutive failures have been seen.
    pub fn record_failure(&mut self, reason: impl Into<String>, failure_threshold: u32) {
        self.last_check = Some(Utc::now());
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.failure_reason = Some(reason.into());

        if self.consecutive_failures >= failure_threshold {
            self.is_healthy = false;
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

// Re-export main types
pub use http::{HttpProber, DEFAULT_PROBE_TIMEOUT};
