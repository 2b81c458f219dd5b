//! Executable validation.

use std::path::Path;
use subsys_common::{SubsystemError, SubsystemResult};

/// Validate that `path` names an existing, executable regular file.
///
/// Used for early diagnostics only; a missing binary is not fatal until a
/// spawn is attempted.
pub fn validate_executable(name: &str, path: &Path) -> SubsystemResult<()> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        SubsystemError::configuration(name, format!("{}: {e}", path.display()))
    })?;

    if !metadata.is_file() {
        return Err(SubsystemError::configuration(
            name,
            format!("{} is not a regular file", path.display()),
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(SubsystemError::configuration(
                name,
                format!("{} is not executable", path.display()),
            ));
        }
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_shell_is_executable() {
        assert!(validate_executable("sh", Path::new("/bin/sh")).is_ok());
    }

    #[test]
    fn test_missing_and_non_files_are_rejected() {
        assert!(validate_executable("x", Path::new("/nonexistent/x")).is_err());
        assert!(validate_executable("tmp", &std::env::temp_dir()).is_err());
    }
}
