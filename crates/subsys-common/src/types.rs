//! Identifier types shared by the subsystem crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subsystem name - identifies one supervised subsystem instance.
///
/// The same name is used as the registry key, as the `subsystem` field on
/// every log line and in error messages.
///
/// # Example
/// ```
/// use subsys_common::SubsystemName;
///
/// let name = SubsystemName::from("app-server");
/// assert_eq!(name.as_str(), "app-server");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubsystemName(String);

impl SubsystemName {
    /// Creates a new name from a string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SubsystemName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubsystemName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&SubsystemName> for String {
    fn from(name: &SubsystemName) -> Self {
        name.0.clone()
    }
}

impl AsRef<str> for SubsystemName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubsystemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exit code reported when a child was terminated by a signal and has no
/// countable exit status.
pub const EXIT_CODE_SIGNALED: i32 = -1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_name() {
        let name = SubsystemName::from("app-server");
        assert_eq!(name.as_str(), "app-server");
        assert_eq!(name.to_string(), "app-server");
        assert!(!name.is_empty());
        assert!(SubsystemName::new(String::new()).is_empty());
    }
}
