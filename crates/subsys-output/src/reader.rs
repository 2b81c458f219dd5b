//! Stream reader feeding an [`OutputMatcher`].

use crate::matcher::OutputMatcher;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Longest line passed to the matcher in one piece. Longer lines are split
/// into consecutive pieces of at most this many bytes.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

impl OutputMatcher {
    /// Spawn a task that feeds every line of `stream` into this matcher.
    ///
    /// The stream joins the matcher's current generation. The task ends at
    /// EOF, which for a child's pipe means every process holding the write
    /// end has exited.
    pub fn attach<R>(&self, stream: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let matcher = self.clone();
        let generation = self.generation();
        tokio::spawn(async move { read_lines(stream, matcher, generation).await })
    }
}

/// Read `stream` line by line until EOF.
///
/// Lines are decoded lossily so a stray non-UTF-8 byte cannot end capture.
/// At most [`MAX_LINE_BYTES`] are buffered per line.
pub async fn read_lines<R>(stream: R, matcher: OutputMatcher, generation: u64)
where
    R: AsyncRead + Unpin,
{
    let stream_type = matcher.stream();
    debug!(stream = %stream_type, generation, "Output reader started");

    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        let limit = MAX_LINE_BYTES as u64;
        match (&mut reader).take(limit).read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if n == MAX_LINE_BYTES && buf.last() != Some(&b'\n') {
                    debug!(stream = %stream_type, "Line longer than {} bytes split", MAX_LINE_BYTES);
                }
                let line = String::from_utf8_lossy(&buf);
                matcher.write_line_from(
                    generation,
                    line.trim_end_matches(|c| c == '\n' || c == '\r'),
                );
            }
            Err(e) => {
                warn!(stream = %stream_type, error = %e, "Error reading child output");
                break;
            }
        }
    }

    debug!(
        stream = %stream_type,
        lines = matcher.stats().lines_processed,
        "Output reader finished"
    );
}
