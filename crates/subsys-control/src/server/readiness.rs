// Readiness announcement recognised on the child's stdout

use lazy_static::lazy_static;
use regex::Regex;

/// Name the readiness watcher is registered under
pub const READY_WATCHER: &str = "checkURL";

lazy_static! {
    /// `serving {"url": "<http(s) url>", ...}`. Group 1 is the URL.
    pub static ref READY_PATTERN: Regex =
        Regex::new(r#"serving\W*\{"url":\W*"(https?://[\w\.:-]+)".*\}"#).expect("valid regex");
}

/// Endpoint announced in a readiness match
pub fn endpoint_from(captures: &[String]) -> Option<&str> {
    captures.get(1).map(String::as_str).filter(|url| !url.is_empty())
}
