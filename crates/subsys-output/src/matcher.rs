//! Regex watchers over a child's output lines.
//!
//! Every line is forwarded to `tracing` at the stream's level, then tested
//! against the registered watchers. A matching watcher receives the captured
//! groups on its channel; one-shot watchers retire after the first match.
//!
//! Delivery never blocks the line producer: channels are bounded and sends
//! use `try_send`. A one-shot channel has exactly one slot, so its single
//! delivery always fits even if nobody is reading yet. Repeating watchers drop
//! matches while their buffer is full.
//!
//! Each attached stream belongs to a generation. Starting a new generation
//! demotes older streams to log-only, so output from a previous child (or a
//! worker it left behind) can never satisfy a watcher armed for the next one.

use crate::types::{Captures, LogLevel, OutputStats, StreamType};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use subsys_common::{SubsystemError, SubsystemResult};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info};

const ONE_SHOT_CAPACITY: usize = 1;
const REPEATING_CAPACITY: usize = 16;

struct Watcher {
    pattern: Regex,
    keep_running: bool,
    tx: mpsc::Sender<Captures>,
}

struct MatcherInner {
    source: String,
    stream: StreamType,
    watchers: Mutex<HashMap<String, Watcher>>,
    generation: AtomicU64,
    lines_processed: AtomicU64,
    bytes_processed: AtomicU64,
    matches_delivered: AtomicU64,
    matches_dropped: AtomicU64,
}

/// Line sink for one output stream of one child.
///
/// Cheap to clone; clones share the watcher table.
#[derive(Clone)]
pub struct OutputMatcher {
    inner: Arc<MatcherInner>,
}

impl std::fmt::Debug for OutputMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputMatcher")
            .field("source", &self.inner.source)
            .field("stream", &self.inner.stream)
            .field("watchers", &self.matcher_count())
            .field("stats", &self.stats())
            .finish()
    }
}

impl OutputMatcher {
    /// Create a matcher for `stream` of the child labelled `source`.
    pub fn new(source: impl Into<String>, stream: StreamType) -> Self {
        Self {
            inner: Arc::new(MatcherInner {
                source: source.into(),
                stream,
                watchers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                lines_processed: AtomicU64::new(0),
                bytes_processed: AtomicU64::new(0),
                matches_delivered: AtomicU64::new(0),
                matches_dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn stream(&self) -> StreamType {
        self.inner.stream
    }

    /// Register `pattern` under `name`.
    ///
    /// Returns the channel the captured groups are delivered on. Without
    /// `keep_running` the watcher retires after its first match.
    pub fn add_matcher(
        &self,
        name: impl Into<String>,
        pattern: Regex,
        keep_running: bool,
    ) -> SubsystemResult<mpsc::Receiver<Captures>> {
        let name = name.into();
        let mut watchers = self.inner.watchers.lock();
        if watchers.contains_key(&name) {
            return Err(SubsystemError::duplicate_watcher(name));
        }

        let capacity = if keep_running {
            REPEATING_CAPACITY
        } else {
            ONE_SHOT_CAPACITY
        };
        let (tx, rx) = mpsc::channel(capacity);

        debug!(
            subsystem = %self.inner.source,
            stream = %self.inner.stream,
            watcher = %name,
            pattern = %pattern,
            keep_running,
            "Watcher registered"
        );

        watchers.insert(
            name,
            Watcher {
                pattern,
                keep_running,
                tx,
            },
        );
        Ok(rx)
    }

    /// Deregister `name`. Returns whether it was still registered.
    pub fn delete_matcher(&self, name: &str) -> bool {
        let removed = self.inner.watchers.lock().remove(name).is_some();
        if removed {
            debug!(subsystem = %self.inner.source, watcher = %name, "Watcher removed");
        }
        removed
    }

    pub fn has_matcher(&self, name: &str) -> bool {
        self.inner.watchers.lock().contains_key(name)
    }

    pub fn matcher_count(&self) -> usize {
        self.inner.watchers.lock().len()
    }

    pub fn stats(&self) -> OutputStats {
        OutputStats {
            lines_processed: self.inner.lines_processed.load(Ordering::Relaxed),
            bytes_processed: self.inner.bytes_processed.load(Ordering::Relaxed),
            matches_delivered: self.inner.matches_delivered.load(Ordering::Relaxed),
            matches_dropped: self.inner.matches_dropped.load(Ordering::Relaxed),
        }
    }

    /// Generation that newly attached streams join.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Start a new generation. Lines from streams of earlier generations are
    /// still logged but no longer matched.
    pub fn next_generation(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Process one output line (without its terminator) of the current
    /// generation.
    pub fn write_line(&self, line: &str) {
        self.write_line_from(self.generation(), line);
    }

    /// Process one output line produced by a stream of `generation`.
    pub fn write_line_from(&self, generation: u64, line: &str) {
        self.inner.lines_processed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .bytes_processed
            .fetch_add(line.len() as u64, Ordering::Relaxed);

        self.log_line(line);
        if generation == self.generation() {
            self.match_line(line);
        }
    }

    fn log_line(&self, line: &str) {
        let source = &self.inner.source;
        let stream = self.inner.stream;
        match stream.log_level() {
            LogLevel::Info => info!(subsystem = %source, stream = %stream, "{}", line),
            LogLevel::Error => error!(subsystem = %source, stream = %stream, "{}", line),
        }
    }

    fn match_line(&self, line: &str) {
        let inner = &self.inner;
        let mut watchers = inner.watchers.lock();
        if watchers.is_empty() {
            return;
        }

        watchers.retain(|name, watcher| {
            let Some(caps) = watcher.pattern.captures(line) else {
                return true;
            };
            let groups: Captures = caps
                .iter()
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect();

            match watcher.tx.try_send(groups) {
                Ok(()) => {
                    inner.matches_delivered.fetch_add(1, Ordering::Relaxed);
                    watcher.keep_running
                }
                Err(TrySendError::Full(_)) => {
                    inner.matches_dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(subsystem = %inner.source, watcher = %name, "Watcher buffer full, match dropped");
                    watcher.keep_running
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subsystem = %inner.source, watcher = %name, "Watcher receiver gone, retiring");
                    false
                }
            }
        });
    }
}
